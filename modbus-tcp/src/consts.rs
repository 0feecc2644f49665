//! Protocol constants.

/// Protocol identifier carried in every MBAP header.
pub const MODBUS_PROTOCOL_ID: u16 = 0;

/// Port used by the test server and client unless told otherwise.
pub const DEFAULT_PORT: u16 = 1502;

/// Port registered for Modbus/TCP.
pub const MODBUS_TCP_PORT: u16 = 502;

pub const READ_COILS_MAX_LEN: u16 = 2000;
pub const READ_DISCRETE_INPUTS_MAX_LEN: u16 = 2000;
pub const READ_HOLDING_REGISTERS_MAX_LEN: u16 = 125;
pub const READ_INPUT_REGISTERS_MAX_LEN: u16 = 125;
pub const WRITE_MULTIPLE_COILS_MAX_LEN: u16 = 1968;
pub const WRITE_MULTIPLE_HOLDING_REGISTERS_MAX_LEN: u16 = 123;

/// Largest number of values a single bank can hold.
pub const BANK_MAX_SIZE: usize = 0x10000;
