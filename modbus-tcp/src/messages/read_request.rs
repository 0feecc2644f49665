use crate::encoding::*;

/// Body shared by the four read functions.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct ReadRequest {
    pub address: u16,
    pub length: u16,
}

impl Encodable for ReadRequest {
    fn encode(&self, encoder: &mut Encoder) -> EncodeResult {
        encoder.write_u16(self.address);
        encoder.write_u16(self.length);
        Ok(())
    }
}

impl Decodable<Self> for ReadRequest {
    fn decode(decoder: &mut Decoder) -> DecodeResult<Self> {
        Ok(Self {
            address: decoder.read_u16()?,
            length: decoder.read_u16()?,
        })
    }
}
