use crate::encoding::*;

const COIL_ON: u16 = 0xFF00;
const COIL_OFF: u16 = 0x0000;

/// Request and response share this layout, the server echoes the request.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct WriteSingleCoil {
    pub address: u16,
    pub value: bool,
}

impl Encodable for WriteSingleCoil {
    fn encode(&self, encoder: &mut Encoder) -> EncodeResult {
        encoder.write_u16(self.address);
        encoder.write_u16(if self.value { COIL_ON } else { COIL_OFF });
        Ok(())
    }
}

impl Decodable<Self> for WriteSingleCoil {
    fn decode(decoder: &mut Decoder) -> DecodeResult<Self> {
        let address = decoder.read_u16()?;
        let value = match decoder.read_u16()? {
            COIL_ON => true,
            COIL_OFF => false,
            _ => return Err(DecodeError::InvalidData("Coil value must be 0xFF00 or 0x0000")),
        };
        Ok(Self { address, value })
    }
}
