use crate::{
    consts::*,
    encoding::*,
    function_code::FunctionCode,
    message::Message,
    messages::*,
    modbus_exception::ModbusException,
    response::ExceptionResponse,
};

/// A decoded request PDU for one of the supported function codes.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Request {
    ReadCoils(ReadRequest),
    ReadDiscreteInputs(ReadRequest),
    ReadHoldingRegisters(ReadRequest),
    ReadInputRegisters(ReadRequest),
    WriteSingleCoil(WriteSingleCoil),
    WriteSingleHoldingRegister(WriteSingleHoldingRegister),
    WriteMultipleCoils(WriteMultipleCoilsRequest),
    WriteMultipleHoldingRegisters(WriteMultipleHoldingRegistersRequest),
}

impl Request {
    pub fn function_code(&self) -> FunctionCode {
        match self {
            Request::ReadCoils(_) => FunctionCode::ReadCoils,
            Request::ReadDiscreteInputs(_) => FunctionCode::ReadDiscreteInputs,
            Request::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            Request::ReadInputRegisters(_) => FunctionCode::ReadInputRegisters,
            Request::WriteSingleCoil(_) => FunctionCode::WriteSingleCoil,
            Request::WriteSingleHoldingRegister(_) => FunctionCode::WriteSingleHoldingRegister,
            Request::WriteMultipleCoils(_) => FunctionCode::WriteMultipleCoils,
            Request::WriteMultipleHoldingRegisters(_) => FunctionCode::WriteMultipleHoldingRegisters,
        }
    }

    /// Decodes a request body.
    ///
    /// Unsupported function codes give [`ModbusException::IllegalFunction`]. A body that is short,
    /// has trailing bytes, inconsistent byte counts or an out of range quantity gives
    /// [`ModbusException::IllegalDataValue`].
    pub fn parse(function_code: FunctionCode, body: &[u8]) -> Result<Self, ModbusException> {
        let mut decoder = Decoder::new(body);
        let request = Self::decode_body(function_code, &mut decoder)?;
        decoder.expect_end().map_err(|_| ModbusException::IllegalDataValue)?;
        request.validate()?;
        Ok(request)
    }

    fn decode_body(function_code: FunctionCode, decoder: &mut Decoder) -> Result<Self, ModbusException> {
        let request = match function_code {
            FunctionCode::ReadCoils => decoder.read_type().map(Request::ReadCoils),
            FunctionCode::ReadDiscreteInputs => decoder.read_type().map(Request::ReadDiscreteInputs),
            FunctionCode::ReadHoldingRegisters => decoder.read_type().map(Request::ReadHoldingRegisters),
            FunctionCode::ReadInputRegisters => decoder.read_type().map(Request::ReadInputRegisters),
            FunctionCode::WriteSingleCoil => decoder.read_type().map(Request::WriteSingleCoil),
            FunctionCode::WriteSingleHoldingRegister => decoder.read_type().map(Request::WriteSingleHoldingRegister),
            FunctionCode::WriteMultipleCoils => decoder.read_type().map(Request::WriteMultipleCoils),
            FunctionCode::WriteMultipleHoldingRegisters => decoder.read_type().map(Request::WriteMultipleHoldingRegisters),
            FunctionCode::Error(_) | FunctionCode::Unknown(_) => return Err(ModbusException::IllegalFunction),
        };
        request.map_err(|_| ModbusException::IllegalDataValue)
    }

    /// Checks the quantity against the per-function maximum and the address space.
    pub fn validate(&self) -> Result<(), ModbusException> {
        match self {
            Request::ReadCoils(req) => validate_input(req.address, req.length as usize, READ_COILS_MAX_LEN),
            Request::ReadDiscreteInputs(req) => validate_input(req.address, req.length as usize, READ_DISCRETE_INPUTS_MAX_LEN),
            Request::ReadHoldingRegisters(req) => validate_input(req.address, req.length as usize, READ_HOLDING_REGISTERS_MAX_LEN),
            Request::ReadInputRegisters(req) => validate_input(req.address, req.length as usize, READ_INPUT_REGISTERS_MAX_LEN),
            Request::WriteSingleCoil(_) | Request::WriteSingleHoldingRegister(_) => Ok(()),
            Request::WriteMultipleCoils(req) => validate_input(req.address, req.values.len(), WRITE_MULTIPLE_COILS_MAX_LEN),
            Request::WriteMultipleHoldingRegisters(req) => {
                validate_input(req.address, req.values.len(), WRITE_MULTIPLE_HOLDING_REGISTERS_MAX_LEN)
            }
        }
    }
}

impl Encodable for Request {
    fn encode(&self, encoder: &mut Encoder) -> EncodeResult {
        match self {
            Request::ReadCoils(req)
            | Request::ReadDiscreteInputs(req)
            | Request::ReadHoldingRegisters(req)
            | Request::ReadInputRegisters(req) => encoder.write_type(req),
            Request::WriteSingleCoil(req) => encoder.write_type(req),
            Request::WriteSingleHoldingRegister(req) => encoder.write_type(req),
            Request::WriteMultipleCoils(req) => encoder.write_type(req),
            Request::WriteMultipleHoldingRegisters(req) => encoder.write_type(req),
        }
    }
}

/// A request together with its MBAP addressing.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct RequestAdu {
    pub transaction_id: u16,
    pub unit_id: u8,
    pub request: Request,
}

impl RequestAdu {
    pub fn to_message(&self) -> Result<Message, EncodeError> {
        Ok(Message {
            transaction_id: self.transaction_id,
            protocol_id: MODBUS_PROTOCOL_ID,
            unit_id: self.unit_id,
            function_code: self.request.function_code(),
            body: self.request.encode_to_bytes()?,
        })
    }

    /// Decodes a framed request. A PDU that cannot be served decodes to the exception to reply with.
    pub fn from_message(msg: &Message) -> Result<Self, ExceptionResponse> {
        let request = Request::parse(msg.function_code, &msg.body).map_err(|code| ExceptionResponse {
            function_code: msg.function_code,
            code,
        })?;
        Ok(Self {
            transaction_id: msg.transaction_id,
            unit_id: msg.unit_id,
            request,
        })
    }
}

fn validate_input(address: u16, length: usize, max_length: u16) -> Result<(), ModbusException> {
    if length == 0 || length > max_length as usize {
        return Err(ModbusException::IllegalDataValue);
    }
    if address as usize + length > BANK_MAX_SIZE {
        return Err(ModbusException::IllegalDataAddress);
    }
    Ok(())
}
