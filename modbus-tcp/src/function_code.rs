use std::fmt::Display;

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum FunctionCode {
    ReadCoils = 0x01,
    ReadDiscreteInputs = 0x02,
    ReadHoldingRegisters = 0x03,
    ReadInputRegisters = 0x04,
    WriteSingleCoil = 0x05,
    WriteSingleHoldingRegister = 0x06,
    WriteMultipleCoils = 0x0F,
    WriteMultipleHoldingRegisters = 0x10,
    /// Exception reply, the high bit is set.
    Error(u8),
    Unknown(u8),
}

impl FunctionCode {
    pub fn as_err(self) -> Self {
        FunctionCode::Error(u8::from(self) | 0x80)
    }

    pub fn is_err(self) -> bool {
        matches!(self, FunctionCode::Error(_))
    }
}

impl From<u8> for FunctionCode {
    fn from(value: u8) -> Self {
        match value {
            0x01 => Self::ReadCoils,
            0x02 => Self::ReadDiscreteInputs,
            0x03 => Self::ReadHoldingRegisters,
            0x04 => Self::ReadInputRegisters,
            0x05 => Self::WriteSingleCoil,
            0x06 => Self::WriteSingleHoldingRegister,
            0x0F => Self::WriteMultipleCoils,
            0x10 => Self::WriteMultipleHoldingRegisters,
            _ => {
                if value & 0x80 != 0 {
                    Self::Error(value)
                } else {
                    Self::Unknown(value)
                }
            }
        }
    }
}

impl From<FunctionCode> for u8 {
    fn from(value: FunctionCode) -> Self {
        match value {
            FunctionCode::ReadCoils => 0x01,
            FunctionCode::ReadDiscreteInputs => 0x02,
            FunctionCode::ReadHoldingRegisters => 0x03,
            FunctionCode::ReadInputRegisters => 0x04,
            FunctionCode::WriteSingleCoil => 0x05,
            FunctionCode::WriteSingleHoldingRegister => 0x06,
            FunctionCode::WriteMultipleCoils => 0x0F,
            FunctionCode::WriteMultipleHoldingRegisters => 0x10,
            FunctionCode::Error(value) => value,
            FunctionCode::Unknown(value) => value,
        }
    }
}

impl PartialEq for FunctionCode {
    fn eq(&self, other: &Self) -> bool {
        u8::from(*self) == u8::from(*other)
    }
}

impl Eq for FunctionCode {}

impl Display for FunctionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionCode::ReadCoils => write!(f, "READ COILS"),
            FunctionCode::ReadDiscreteInputs => write!(f, "READ DISCRETE INPUTS"),
            FunctionCode::ReadHoldingRegisters => write!(f, "READ HOLDING REGISTERS"),
            FunctionCode::ReadInputRegisters => write!(f, "READ INPUT REGISTERS"),
            FunctionCode::WriteSingleCoil => write!(f, "WRITE SINGLE COIL"),
            FunctionCode::WriteSingleHoldingRegister => write!(f, "WRITE SINGLE REGISTER"),
            FunctionCode::WriteMultipleCoils => write!(f, "WRITE MULTIPLE COILS"),
            FunctionCode::WriteMultipleHoldingRegisters => write!(f, "WRITE MULTIPLE REGISTERS"),
            FunctionCode::Error(value) => write!(f, "EXCEPTION ({value:#04X})"),
            FunctionCode::Unknown(value) => write!(f, "UNKNOWN ({value:#04X})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_set_the_high_bit() {
        assert_eq!(u8::from(FunctionCode::ReadHoldingRegisters.as_err()), 0x83);
        assert_eq!(u8::from(FunctionCode::Unknown(0x2B).as_err()), 0xAB);
        assert!(FunctionCode::from(0x90).is_err());
        assert_eq!(FunctionCode::from(0x2B), FunctionCode::Unknown(0x2B));
    }
}
