use crate::encoding::*;

/// Request and response share this layout, the server echoes the request.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct WriteSingleHoldingRegister {
    pub address: u16,
    pub value: u16,
}

impl Encodable for WriteSingleHoldingRegister {
    fn encode(&self, encoder: &mut Encoder) -> EncodeResult {
        encoder.write_u16(self.address);
        encoder.write_u16(self.value);
        Ok(())
    }
}

impl Decodable<Self> for WriteSingleHoldingRegister {
    fn decode(decoder: &mut Decoder) -> DecodeResult<Self> {
        Ok(Self {
            address: decoder.read_u16()?,
            value: decoder.read_u16()?,
        })
    }
}
