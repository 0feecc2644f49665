use crate::{consts::MODBUS_PROTOCOL_ID, function_code::FunctionCode};

use super::encoding::*;

/// Largest ADU: 7 header bytes plus a 253 byte PDU.
pub const MSG_MAX_LENGTH: usize = 260;

/// Smallest valid value of the length field: unit id and function code.
const MIN_BYTE_LENGTH: u16 = 2;
const MAX_BYTE_LENGTH: u16 = (MSG_MAX_LENGTH - 6) as u16;

/// One MBAP framed message with its PDU body left undecoded.
#[derive(PartialEq, Debug, Clone)]
pub struct Message {
    pub transaction_id: u16,
    pub protocol_id: u16,
    pub unit_id: u8,
    pub function_code: FunctionCode,
    pub body: Vec<u8>,
}

impl Encodable for Message {
    fn encode(&self, encoder: &mut Encoder) -> EncodeResult {
        let byte_length: u16 = (self.body.len() + 2).try_into()?;
        if byte_length > MAX_BYTE_LENGTH {
            return Err(EncodeError::Overflow);
        }
        encoder.write_u16(self.transaction_id);
        encoder.write_u16(self.protocol_id);
        encoder.write_u16(byte_length);
        encoder.write_u8(self.unit_id);
        encoder.write_u8(self.function_code.into());
        encoder.write_bytes(&self.body);
        Ok(())
    }
}

impl Decodable<Self> for Message {
    /// `MissingData` means the frame is incomplete, `InvalidData` that the header can never be valid.
    fn decode(decoder: &mut Decoder) -> DecodeResult<Self> {
        let transaction_id = decoder.read_u16()?;
        let protocol_id = decoder.read_u16()?;
        let byte_length = decoder.read_u16()?;

        if protocol_id != MODBUS_PROTOCOL_ID {
            return Err(DecodeError::InvalidData("Unknown protocol id"));
        }
        if byte_length < MIN_BYTE_LENGTH {
            return Err(DecodeError::InvalidData("Byte length too small"));
        }
        if byte_length > MAX_BYTE_LENGTH {
            return Err(DecodeError::InvalidData("Byte length too large"));
        }

        let unit_id = decoder.read_u8()?;
        let function_code = decoder.read_u8()?.into();

        let body = decoder.read_bytes((byte_length - 2).into())?;

        Ok(Self {
            transaction_id,
            protocol_id,
            unit_id,
            function_code,
            body,
        })
    }
}
