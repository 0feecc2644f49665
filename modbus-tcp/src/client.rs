use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU16, Ordering},
        Arc,
    },
    time::Duration,
};

use thiserror::Error;
use tokio::{
    net::{TcpStream, ToSocketAddrs},
    sync::{oneshot, Mutex},
    task::{AbortHandle, JoinHandle},
};

use crate::{
    connection::*,
    message::Message,
    messages::*,
    modbus_exception::ModbusException,
    request::{Request, RequestAdu},
    response::{DataResponse, Response, ResponseAdu},
};

/// How long a request waits for its reply unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Errors returned by the [`ModbusTCPClient`].
#[derive(Error, Debug, Clone)]
pub enum ModbusError {
    /// Represent an IO error.
    #[error("{0}")]
    IO(Arc<tokio::io::Error>),
    /// Some arguments provided to the function are out of range.
    /// Commonly the combination of address + length is outside the allowed range.
    /// The request was never sent to the server.
    #[error("Argument out of range: {0}")]
    ArgumentsOutOfRange(String),
    /// Indicates that the response received from the server is not a valid response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// No reply arrived within the client's timeout.
    #[error("No response within {}ms", .0.as_millis())]
    Timeout(Duration),
    /// The connection closed before the reply arrived.
    #[error("Connection closed")]
    Disconnected,
    /// Exception code reported by the server.
    #[error("{0}")]
    ModbusException(ModbusException),
}

impl From<tokio::io::Error> for ModbusError {
    fn from(value: tokio::io::Error) -> Self {
        ModbusError::IO(Arc::new(value))
    }
}

type ResponseResult = Result<Message, ModbusError>;

/// Callers waiting for a reply, keyed by transaction id.
#[derive(Default)]
struct Pending {
    closed: bool,
    senders: HashMap<u16, oneshot::Sender<ResponseResult>>,
}

type ResponseMap = Arc<Mutex<Pending>>;

/// Modbus/TCP client. Requests may be issued concurrently, replies are matched by transaction id.
pub struct ModbusTCPClient {
    connection: Arc<Connection>,
    transaction_id: AtomicU16,
    response_map: ResponseMap,
    timeout: Duration,
    abort_handle: AbortHandle,
}

impl ModbusTCPClient {
    /// Wraps a connected stream. The returned handle completes when the connection closes.
    pub fn new(stream: TcpStream) -> (Self, JoinHandle<Result<(), ModbusError>>) {
        let connection = Arc::new(Connection::new(stream));
        let response_map: ResponseMap = Arc::default();

        let join_handle = tokio::spawn(Self::receive_response(connection.clone(), response_map.clone()));

        let client = Self {
            connection,
            transaction_id: AtomicU16::default(),
            response_map,
            timeout: DEFAULT_TIMEOUT,
            abort_handle: join_handle.abort_handle(),
        };

        (client, join_handle)
    }

    /// Connects to `addr`, giving up after `timeout`, which also becomes the request timeout.
    pub async fn connect<A: ToSocketAddrs>(addr: A, timeout: Duration) -> Result<(Self, JoinHandle<Result<(), ModbusError>>), ModbusError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ModbusError::Timeout(timeout))??;
        let (client, handle) = Self::new(stream);
        Ok((client.with_timeout(timeout), handle))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn read_coils(&self, unit_id: u8, address: u16, length: u16) -> Result<Vec<bool>, ModbusError> {
        match self.call(unit_id, Request::ReadCoils(ReadRequest { address, length })).await? {
            DataResponse::ReadCoils(values) => Ok(values),
            _ => Err(unexpected()),
        }
    }

    pub async fn read_discrete_inputs(&self, unit_id: u8, address: u16, length: u16) -> Result<Vec<bool>, ModbusError> {
        match self.call(unit_id, Request::ReadDiscreteInputs(ReadRequest { address, length })).await? {
            DataResponse::ReadDiscreteInputs(values) => Ok(values),
            _ => Err(unexpected()),
        }
    }

    pub async fn read_input_registers(&self, unit_id: u8, address: u16, length: u16) -> Result<Vec<u16>, ModbusError> {
        match self.call(unit_id, Request::ReadInputRegisters(ReadRequest { address, length })).await? {
            DataResponse::ReadInputRegisters(values) => Ok(values),
            _ => Err(unexpected()),
        }
    }

    pub async fn read_holding_registers(&self, unit_id: u8, address: u16, length: u16) -> Result<Vec<u16>, ModbusError> {
        match self.call(unit_id, Request::ReadHoldingRegisters(ReadRequest { address, length })).await? {
            DataResponse::ReadHoldingRegisters(values) => Ok(values),
            _ => Err(unexpected()),
        }
    }

    pub async fn write_single_coil(&self, unit_id: u8, address: u16, value: bool) -> Result<(), ModbusError> {
        let req = WriteSingleCoil { address, value };
        match self.call(unit_id, Request::WriteSingleCoil(req)).await? {
            DataResponse::WriteSingleCoil(res) if res == req => Ok(()),
            _ => Err(unexpected()),
        }
    }

    pub async fn write_single_holding_register(&self, unit_id: u8, address: u16, value: u16) -> Result<(), ModbusError> {
        let req = WriteSingleHoldingRegister { address, value };
        match self.call(unit_id, Request::WriteSingleHoldingRegister(req)).await? {
            DataResponse::WriteSingleHoldingRegister(res) if res == req => Ok(()),
            _ => Err(unexpected()),
        }
    }

    pub async fn write_multiple_coils(&self, unit_id: u8, address: u16, values: &[bool]) -> Result<(), ModbusError> {
        let req = WriteMultipleCoilsRequest {
            address,
            values: values.to_vec(),
        };
        match self.call(unit_id, Request::WriteMultipleCoils(req)).await? {
            DataResponse::WriteMultipleCoils(res) if res.address == address && res.length as usize == values.len() => Ok(()),
            _ => Err(unexpected()),
        }
    }

    pub async fn write_multiple_holding_registers(&self, unit_id: u8, address: u16, values: &[u16]) -> Result<(), ModbusError> {
        let req = WriteMultipleHoldingRegistersRequest {
            address,
            values: values.to_vec(),
        };
        match self.call(unit_id, Request::WriteMultipleHoldingRegisters(req)).await? {
            DataResponse::WriteMultipleHoldingRegisters(res) if res.address == address && res.length as usize == values.len() => Ok(()),
            _ => Err(unexpected()),
        }
    }

    /// Sends `request` and waits for the matching reply.
    ///
    /// An exception reply is returned as [`ModbusError::ModbusException`], no reply within the
    /// timeout as [`ModbusError::Timeout`].
    pub async fn call(&self, unit_id: u8, request: Request) -> Result<DataResponse, ModbusError> {
        request
            .validate()
            .map_err(|ex| ModbusError::ArgumentsOutOfRange(format!("{} request rejected: {ex}", request.function_code())))?;

        let adu = RequestAdu {
            transaction_id: self.transaction_id.fetch_add(1, Ordering::Relaxed),
            unit_id,
            request,
        };
        let msg = adu
            .to_message()
            .map_err(|_| ModbusError::ArgumentsOutOfRange("Error encoding message".to_string()))?;

        let res_msg = self.send_request(msg).await?;

        if res_msg.unit_id != unit_id {
            return Err(ModbusError::InvalidResponse("Unit id mismatch".to_string()));
        }

        let res = ResponseAdu::from_message(&res_msg, &adu.request).map_err(|err| ModbusError::InvalidResponse(err.to_string()))?;

        match res.response {
            Response::Data(data) => Ok(data),
            Response::Exception(ex) => Err(ModbusError::ModbusException(ex.code)),
        }
    }

    async fn send_request(&self, msg: Message) -> Result<Message, ModbusError> {
        let transaction_id = msg.transaction_id;
        let (sender, receiver) = oneshot::channel::<ResponseResult>();

        {
            let mut pending = self.response_map.lock().await;
            if pending.closed {
                return Err(ModbusError::Disconnected);
            }
            pending.senders.insert(transaction_id, sender);
        }

        // A write cut short would leave half a frame on the stream, so it runs to completion on its
        // own task even when the caller stops waiting.
        let connection = self.connection.clone();
        let write = tokio::spawn(async move { connection.write_message(&msg).await });

        let exchange = async {
            match write.await {
                Ok(Ok(_)) => {}
                Ok(Err(WriteError::IO(e))) => return Err(ModbusError::from(e)),
                Ok(Err(WriteError::Encode(_))) => return Err(ModbusError::ArgumentsOutOfRange("Error encoding message".to_string())),
                Err(_) => return Err(ModbusError::Disconnected),
            }
            receiver.await.unwrap_or(Err(ModbusError::Disconnected))
        };

        let result = tokio::time::timeout(self.timeout, exchange)
            .await
            .unwrap_or(Err(ModbusError::Timeout(self.timeout)));

        if result.is_err() {
            self.response_map.lock().await.senders.remove(&transaction_id);
        }

        result
    }

    async fn receive_response(connection: Arc<Connection>, response_map: ResponseMap) -> Result<(), ModbusError> {
        let result = loop {
            let msg = match connection.read_message().await {
                Ok(Some(msg)) => msg,
                Ok(None) => break Ok(()),
                Err(ReadError::IO(error)) => break Err(ModbusError::from(error)),
                Err(ReadError::Decode(_)) => break Err(ModbusError::InvalidResponse("The server sent invalid data".into())),
            };

            let sender = response_map.lock().await.senders.remove(&msg.transaction_id);
            match sender {
                // Most likely the reply to a request that already timed out.
                None => tracing::warn!("discarding reply with unknown transaction id {}", msg.transaction_id),
                Some(sender) => _ = sender.send(Ok(msg)),
            }
        };

        let mut pending = response_map.lock().await;
        pending.closed = true;
        for (_, sender) in pending.senders.drain() {
            _ = sender.send(Err(match &result {
                Ok(()) => ModbusError::Disconnected,
                Err(error) => error.clone(),
            }));
        }

        result
    }
}

impl Drop for ModbusTCPClient {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

fn unexpected() -> ModbusError {
    ModbusError::InvalidResponse("Malformed response".to_string())
}
