use thiserror::Error;

/**
 * Exception codes as defined by the protocol.
 * See the [MODBUS Application Protocol Specification](https://www.modbus.org/docs/Modbus_Application_Protocol_V1_1b3.pdf) for more details.
 */
#[repr(u8)]
#[derive(Error, Debug, Clone, Copy)]
pub enum ModbusException {
    /// The function code received in the query is not an allowable action for the server.
    #[error("illegal function")]
    IllegalFunction = 1,
    /// The data address received in the query is not an allowable address for the server.
    #[error("illegal data address")]
    IllegalDataAddress = 2,
    /// A value contained in the query data field is not an allowable value for server.
    #[error("illegal data value")]
    IllegalDataValue = 3,
    /// An unrecoverable error occurred while the server was attempting to perform the requested action.
    #[error("server device failure")]
    ServerDeviceFailure = 4,
    /// A code this crate does not know, as reported by a remote server.
    #[error("unknown exception ({0:#04X})")]
    Unknown(u8),
}

impl From<u8> for ModbusException {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::IllegalFunction,
            2 => Self::IllegalDataAddress,
            3 => Self::IllegalDataValue,
            4 => Self::ServerDeviceFailure,
            _ => Self::Unknown(value),
        }
    }
}

impl From<ModbusException> for u8 {
    fn from(value: ModbusException) -> Self {
        match value {
            ModbusException::IllegalFunction => 1,
            ModbusException::IllegalDataAddress => 2,
            ModbusException::IllegalDataValue => 3,
            ModbusException::ServerDeviceFailure => 4,
            ModbusException::Unknown(value) => value,
        }
    }
}

impl PartialEq for ModbusException {
    fn eq(&self, other: &Self) -> bool {
        u8::from(*self) == u8::from(*other)
    }
}

impl Eq for ModbusException {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_are_carried_through() {
        assert_eq!(ModbusException::from(0x0B), ModbusException::Unknown(0x0B));
        assert_eq!(u8::from(ModbusException::Unknown(0x0B)), 0x0B);
        assert_eq!(ModbusException::from(2), ModbusException::IllegalDataAddress);
        assert_eq!(ModbusException::Unknown(0x0B).to_string(), "unknown exception (0x0B)");
    }
}
