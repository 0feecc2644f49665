use std::borrow::Cow;

use crate::encoding::*;

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct ReadBitsResponse<'a> {
    pub values: Cow<'a, [bool]>,
}

impl ReadBitsResponse<'_> {
    /// The bit count is not on the wire, so the caller supplies the quantity it asked for.
    pub fn decode_bits(decoder: &mut Decoder, length: u16) -> DecodeResult<Self> {
        let byte_length = decoder.read_u8()? as usize;
        if byte_length != (length as usize).div_ceil(8) {
            return Err(DecodeError::InvalidData("Byte length does not match the requested quantity"));
        }
        Ok(Self {
            values: decoder.read_bools(length as usize)?.into(),
        })
    }
}

impl Encodable for ReadBitsResponse<'_> {
    fn encode(&self, encoder: &mut Encoder) -> EncodeResult {
        let byte_length: u8 = self.values.len().div_ceil(8).try_into()?;
        encoder.write_u8(byte_length);
        encoder.write_bools(&self.values);
        Ok(())
    }
}
