use crate::encoding::*;

/// Reply to both multiple-write functions: where the write started and how many values it covered.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct WriteMultipleResponse {
    pub address: u16,
    pub length: u16,
}

impl Encodable for WriteMultipleResponse {
    fn encode(&self, encoder: &mut Encoder) -> EncodeResult {
        encoder.write_u16(self.address);
        encoder.write_u16(self.length);
        Ok(())
    }
}

impl Decodable<Self> for WriteMultipleResponse {
    fn decode(decoder: &mut Decoder) -> DecodeResult<Self> {
        Ok(Self {
            address: decoder.read_u16()?,
            length: decoder.read_u16()?,
        })
    }
}
