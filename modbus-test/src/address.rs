use thiserror::Error;

/// The bank an address refers to, selected by its leading digit.
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum AddressKind {
    Coil,
    DiscreteInput,
    InputRegister,
    HoldingRegister,
}

impl AddressKind {
    fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            '0' => Some(Self::Coil),
            '1' => Some(Self::DiscreteInput),
            '3' => Some(Self::InputRegister),
            '4' => Some(Self::HoldingRegister),
            _ => None,
        }
    }

    pub fn prefix(self) -> char {
        match self {
            Self::Coil => '0',
            Self::DiscreteInput => '1',
            Self::InputRegister => '3',
            Self::HoldingRegister => '4',
        }
    }

    /// Only coils and holding registers can be written over the wire.
    pub fn is_writable(self) -> bool {
        matches!(self, Self::Coil | Self::HoldingRegister)
    }
}

#[derive(Error, PartialEq, Clone, Debug)]
pub enum ParseAddressError {
    #[error("Empty value")]
    Empty,
    #[error("Address must start with 0, 1, 3 or 4.")]
    Prefix,
    #[error("Address must be 2 to 6 digits long")]
    Length,
    #[error("Address must only contain digits")]
    Digits,
    #[error("Address out of range")]
    OutOfRange,
}

/// A user supplied address such as `400001`, resolved to a bank and a zero based index.
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct Address {
    pub kind: AddressKind,
    pub index: u16,
}

impl Address {
    /// `offset` is added to the typed number, so `-1` turns the one based `400001` into index 0.
    pub fn parse(value: &str, offset: i32) -> Result<Self, ParseAddressError> {
        let mut chars = value.chars();
        let kind = match chars.next() {
            None => return Err(ParseAddressError::Empty),
            Some(prefix) => AddressKind::from_prefix(prefix).ok_or(ParseAddressError::Prefix)?,
        };

        let digits = chars.as_str();
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseAddressError::Digits);
        }
        if digits.is_empty() || digits.len() > 5 {
            return Err(ParseAddressError::Length);
        }

        let number: i64 = digits.parse().map_err(|_| ParseAddressError::OutOfRange)?;
        let index = u16::try_from(number + i64::from(offset)).map_err(|_| ParseAddressError::OutOfRange)?;

        Ok(Self { kind, index })
    }

    /// The label for the value `n` places after this address, in the form the user typed it.
    pub fn label(&self, n: usize, offset: i32) -> String {
        let number = i64::from(self.index) + n as i64 - i64::from(offset);
        format!("{}{number:05}", self.kind.prefix())
    }
}
