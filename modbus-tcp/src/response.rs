use crate::{
    consts::MODBUS_PROTOCOL_ID,
    encoding::*,
    function_code::FunctionCode,
    message::Message,
    messages::*,
    modbus_exception::ModbusException,
    request::Request,
};

/// Successful reply PDU, one variant per request kind.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum DataResponse {
    ReadCoils(Vec<bool>),
    ReadDiscreteInputs(Vec<bool>),
    ReadHoldingRegisters(Vec<u16>),
    ReadInputRegisters(Vec<u16>),
    WriteSingleCoil(WriteSingleCoil),
    WriteSingleHoldingRegister(WriteSingleHoldingRegister),
    WriteMultipleCoils(WriteMultipleResponse),
    WriteMultipleHoldingRegisters(WriteMultipleResponse),
}

impl DataResponse {
    pub fn function_code(&self) -> FunctionCode {
        match self {
            DataResponse::ReadCoils(_) => FunctionCode::ReadCoils,
            DataResponse::ReadDiscreteInputs(_) => FunctionCode::ReadDiscreteInputs,
            DataResponse::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            DataResponse::ReadInputRegisters(_) => FunctionCode::ReadInputRegisters,
            DataResponse::WriteSingleCoil(_) => FunctionCode::WriteSingleCoil,
            DataResponse::WriteSingleHoldingRegister(_) => FunctionCode::WriteSingleHoldingRegister,
            DataResponse::WriteMultipleCoils(_) => FunctionCode::WriteMultipleCoils,
            DataResponse::WriteMultipleHoldingRegisters(_) => FunctionCode::WriteMultipleHoldingRegisters,
        }
    }

    /// Decodes the reply body to `request`. Bit reads are trimmed to the requested quantity and
    /// register reads must carry exactly the requested count.
    pub fn parse(request: &Request, body: &[u8]) -> DecodeResult<Self> {
        let mut decoder = Decoder::new(body);
        let response = match request {
            Request::ReadCoils(req) => DataResponse::ReadCoils(ReadBitsResponse::decode_bits(&mut decoder, req.length)?.values.into_owned()),
            Request::ReadDiscreteInputs(req) => {
                DataResponse::ReadDiscreteInputs(ReadBitsResponse::decode_bits(&mut decoder, req.length)?.values.into_owned())
            }
            Request::ReadHoldingRegisters(req) => DataResponse::ReadHoldingRegisters(read_registers(&mut decoder, req.length)?),
            Request::ReadInputRegisters(req) => DataResponse::ReadInputRegisters(read_registers(&mut decoder, req.length)?),
            Request::WriteSingleCoil(_) => DataResponse::WriteSingleCoil(decoder.read_type()?),
            Request::WriteSingleHoldingRegister(_) => DataResponse::WriteSingleHoldingRegister(decoder.read_type()?),
            Request::WriteMultipleCoils(_) => DataResponse::WriteMultipleCoils(decoder.read_type()?),
            Request::WriteMultipleHoldingRegisters(_) => DataResponse::WriteMultipleHoldingRegisters(decoder.read_type()?),
        };
        decoder.expect_end()?;
        Ok(response)
    }
}

fn read_registers(decoder: &mut Decoder, length: u16) -> DecodeResult<Vec<u16>> {
    let res: ReadRegistersResponse = decoder.read_type()?;
    if res.values.len() != length as usize {
        return Err(DecodeError::InvalidData("Register count does not match the requested quantity"));
    }
    Ok(res.values.into_owned())
}

impl Encodable for DataResponse {
    fn encode(&self, encoder: &mut Encoder) -> EncodeResult {
        match self {
            DataResponse::ReadCoils(values) | DataResponse::ReadDiscreteInputs(values) => {
                encoder.write_type(&ReadBitsResponse { values: values.into() })
            }
            DataResponse::ReadHoldingRegisters(values) | DataResponse::ReadInputRegisters(values) => {
                encoder.write_type(&ReadRegistersResponse { values: values.into() })
            }
            DataResponse::WriteSingleCoil(res) => encoder.write_type(res),
            DataResponse::WriteSingleHoldingRegister(res) => encoder.write_type(res),
            DataResponse::WriteMultipleCoils(res) | DataResponse::WriteMultipleHoldingRegisters(res) => encoder.write_type(res),
        }
    }
}

/// Exception reply: the request's function code with the high bit set, followed by the exception code.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct ExceptionResponse {
    /// Function code of the request, without the exception bit.
    pub function_code: FunctionCode,
    pub code: ModbusException,
}

/// Exactly one of these answers every well-formed request.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Response {
    Data(DataResponse),
    Exception(ExceptionResponse),
}

impl Response {
    pub fn function_code(&self) -> FunctionCode {
        match self {
            Response::Data(res) => res.function_code(),
            Response::Exception(ex) => ex.function_code.as_err(),
        }
    }
}

impl From<ExceptionResponse> for Response {
    fn from(value: ExceptionResponse) -> Self {
        Response::Exception(value)
    }
}

impl Encodable for Response {
    fn encode(&self, encoder: &mut Encoder) -> EncodeResult {
        match self {
            Response::Data(res) => encoder.write_type(res),
            Response::Exception(ex) => encoder.write_type(&ExceptionMessage::from(ex.code)),
        }
    }
}

/// A response together with the MBAP addressing echoed from its request.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct ResponseAdu {
    pub transaction_id: u16,
    pub unit_id: u8,
    pub response: Response,
}

impl ResponseAdu {
    pub fn to_message(&self) -> Result<Message, EncodeError> {
        Ok(Message {
            transaction_id: self.transaction_id,
            protocol_id: MODBUS_PROTOCOL_ID,
            unit_id: self.unit_id,
            function_code: self.response.function_code(),
            body: self.response.encode_to_bytes()?,
        })
    }

    /// Decodes the reply to `request`, which supplies the context the wire format leaves out.
    pub fn from_message(msg: &Message, request: &Request) -> DecodeResult<Self> {
        let expected = request.function_code();
        let response = if msg.function_code.is_err() {
            if msg.function_code != expected.as_err() {
                return Err(DecodeError::InvalidData("Function code mismatch"));
            }
            let mut decoder = Decoder::new(&msg.body);
            let ex: ExceptionMessage = decoder.read_type()?;
            decoder.expect_end()?;
            Response::Exception(ExceptionResponse {
                function_code: expected,
                code: ex.code,
            })
        } else {
            if msg.function_code != expected {
                return Err(DecodeError::InvalidData("Function code mismatch"));
            }
            Response::Data(DataResponse::parse(request, &msg.body)?)
        };
        Ok(Self {
            transaction_id: msg.transaction_id,
            unit_id: msg.unit_id,
            response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(request: Request, response: Response) {
        let adu = ResponseAdu {
            transaction_id: 0xABCD,
            unit_id: 1,
            response,
        };
        let bytes = adu.to_message().unwrap().encode_to_bytes().unwrap();
        let msg = Message::decode_from_bytes(&bytes).unwrap();
        assert_eq!(ResponseAdu::from_message(&msg, &request), Ok(adu));
    }

    fn read(address: u16, length: u16) -> ReadRequest {
        ReadRequest { address, length }
    }

    #[test]
    fn responses_round_trip() {
        round_trip(
            Request::ReadCoils(read(0, 10)),
            Response::Data(DataResponse::ReadCoils(vec![true, false, true, true, false, false, false, false, true, true])),
        );
        round_trip(
            Request::ReadDiscreteInputs(read(0, 3)),
            Response::Data(DataResponse::ReadDiscreteInputs(vec![false, true, false])),
        );
        round_trip(
            Request::ReadHoldingRegisters(read(0, 3)),
            Response::Data(DataResponse::ReadHoldingRegisters(vec![0, 42, 0xFFFF])),
        );
        round_trip(
            Request::ReadInputRegisters(read(9, 1)),
            Response::Data(DataResponse::ReadInputRegisters(vec![7])),
        );
        let coil = WriteSingleCoil { address: 3, value: true };
        round_trip(Request::WriteSingleCoil(coil), Response::Data(DataResponse::WriteSingleCoil(coil)));
        let register = WriteSingleHoldingRegister { address: 3, value: 42 };
        round_trip(
            Request::WriteSingleHoldingRegister(register),
            Response::Data(DataResponse::WriteSingleHoldingRegister(register)),
        );
        round_trip(
            Request::WriteMultipleCoils(WriteMultipleCoilsRequest {
                address: 1,
                values: vec![true; 12],
            }),
            Response::Data(DataResponse::WriteMultipleCoils(WriteMultipleResponse { address: 1, length: 12 })),
        );
        round_trip(
            Request::WriteMultipleHoldingRegisters(WriteMultipleHoldingRegistersRequest {
                address: 10,
                values: vec![1, 2],
            }),
            Response::Data(DataResponse::WriteMultipleHoldingRegisters(WriteMultipleResponse { address: 10, length: 2 })),
        );
        round_trip(
            Request::ReadHoldingRegisters(read(100, 1)),
            Response::Exception(ExceptionResponse {
                function_code: FunctionCode::ReadHoldingRegisters,
                code: ModbusException::IllegalDataAddress,
            }),
        );
    }

    #[test]
    fn exception_wire_layout() {
        let adu = ResponseAdu {
            transaction_id: 9,
            unit_id: 1,
            response: Response::Exception(ExceptionResponse {
                function_code: FunctionCode::Unknown(0x2B),
                code: ModbusException::IllegalFunction,
            }),
        };
        let bytes = adu.to_message().unwrap().encode_to_bytes().unwrap();
        assert_eq!(bytes, vec![0x00, 0x09, 0x00, 0x00, 0x00, 0x03, 0x01, 0xAB, 0x01]);
    }

    #[test]
    fn mismatched_replies_are_rejected() {
        let request = Request::ReadHoldingRegisters(read(0, 2));
        let msg = Message {
            transaction_id: 1,
            protocol_id: 0,
            unit_id: 1,
            function_code: FunctionCode::ReadHoldingRegisters,
            body: vec![2, 0, 1],
        };
        assert!(ResponseAdu::from_message(&msg, &request).is_err());

        let msg = Message {
            function_code: FunctionCode::ReadInputRegisters,
            body: vec![4, 0, 1, 0, 2],
            ..msg
        };
        assert_eq!(
            ResponseAdu::from_message(&msg, &request),
            Err(DecodeError::InvalidData("Function code mismatch"))
        );
    }
}
