//! Modbus/TCP server and client.
//!
//! The server keeps one [`RegisterStore`] shared by every connection and serves each connection from
//! its own task. The client correlates replies to requests by transaction id.

mod client;
mod connection;
pub mod consts;
mod encoding;
mod function_code;
mod message;
mod messages;
mod modbus_exception;
mod request;
mod response;
mod server;
mod session;
mod store;

pub use client::{ModbusError, ModbusTCPClient, DEFAULT_TIMEOUT};
pub use connection::{ReadError, WriteError};
pub use encoding::{Decodable, DecodeError, DecodeResult, Decoder, Encodable, EncodeError, EncodeResult, Encoder};
pub use function_code::FunctionCode;
pub use message::{Message, MSG_MAX_LENGTH};
pub use messages::{
    ReadRequest, WriteMultipleCoilsRequest, WriteMultipleHoldingRegistersRequest, WriteMultipleResponse, WriteSingleCoil, WriteSingleHoldingRegister,
};
pub use modbus_exception::ModbusException;
pub use request::{Request, RequestAdu};
pub use response::{DataResponse, ExceptionResponse, Response, ResponseAdu};
pub use server::{ModbusTCPServer, ServerConfig, ServerHandle};
pub use session::{execute, SessionError};
pub use store::{BankSizes, BitBank, RegisterBank, RegisterStore};
