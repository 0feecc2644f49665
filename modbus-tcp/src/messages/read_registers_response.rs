use std::borrow::Cow;

use crate::encoding::*;

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct ReadRegistersResponse<'a> {
    pub values: Cow<'a, [u16]>,
}

impl Encodable for ReadRegistersResponse<'_> {
    fn encode(&self, encoder: &mut Encoder) -> EncodeResult {
        encoder.write_u8((self.values.len() * 2).try_into()?);
        encoder.write_registers(&self.values);
        Ok(())
    }
}

impl Decodable<Self> for ReadRegistersResponse<'_> {
    fn decode(decoder: &mut Decoder) -> DecodeResult<Self> {
        let byte_length = decoder.read_u8()?;
        if byte_length % 2 != 0 {
            return Err(DecodeError::InvalidData("Byte length in not a multiple of 2"));
        }
        Ok(Self {
            values: decoder.read_registers((byte_length / 2) as usize)?.into(),
        })
    }
}
