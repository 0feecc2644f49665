mod exception_message;
mod read_bits_response;
mod read_registers_response;
mod read_request;
mod write_multiple_coils_request;
mod write_multiple_holding_registers_request;
mod write_multiple_response;
mod write_single_coil;
mod write_single_holding_register;

pub use exception_message::*;
pub use read_bits_response::*;
pub use read_registers_response::*;
pub use read_request::*;
pub use write_multiple_coils_request::*;
pub use write_multiple_holding_registers_request::*;
pub use write_multiple_response::*;
pub use write_single_coil::*;
pub use write_single_holding_register::*;
