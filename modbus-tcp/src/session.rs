use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{net::TcpStream, sync::watch};

use crate::{
    connection::{Connection, ReadError, WriteError},
    encoding::EncodeError,
    message::Message,
    messages::*,
    modbus_exception::ModbusException,
    request::{Request, RequestAdu},
    response::{DataResponse, ExceptionResponse, Response, ResponseAdu},
    store::{BitBank, RegisterBank, RegisterStore},
};

/// Why a session ended other than by the peer closing or a shutdown.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("no request within {0:?}")]
    Idle(Duration),
}

/// Serves one client connection: read a frame, execute it against the store, reply, repeat.
/// Requests on a connection are handled strictly one after the other.
pub(crate) struct Session {
    connection: Connection,
    store: Arc<RegisterStore>,
    idle_timeout: Option<Duration>,
}

impl Session {
    pub(crate) fn new(stream: TcpStream, store: Arc<RegisterStore>, idle_timeout: Option<Duration>) -> Self {
        Self {
            connection: Connection::new(stream),
            store,
            idle_timeout,
        }
    }

    /// Runs until the peer disconnects, an unrecoverable error occurs or `shutdown` flips to `true`.
    /// Shutdown also interrupts a reply write the peer is not draining.
    pub(crate) async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), SessionError> {
        loop {
            let msg = tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                msg = self.next_message() => msg?,
            };

            let Some(msg) = msg else {
                return Ok(());
            };

            let reply = self.handle(&msg).await;
            let reply = match reply.to_message() {
                Ok(reply) => reply,
                Err(err) => {
                    tracing::warn!("unable to encode reply: {}", err);
                    failure_reply(&msg).to_message()?
                }
            };

            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                result = self.connection.write_message(&reply) => result?,
            }
        }

        tracing::debug!("closing session for shutdown");
        _ = self.connection.shutdown().await;
        Ok(())
    }

    async fn next_message(&self) -> Result<Option<Message>, SessionError> {
        match self.idle_timeout {
            None => Ok(self.connection.read_message().await?),
            Some(idle_timeout) => match tokio::time::timeout(idle_timeout, self.connection.read_message()).await {
                Ok(msg) => Ok(msg?),
                Err(_) => Err(SessionError::Idle(idle_timeout)),
            },
        }
    }

    async fn handle(&self, msg: &Message) -> ResponseAdu {
        let response = match RequestAdu::from_message(msg) {
            Ok(adu) => {
                tracing::debug!("RX - {} {:?}", msg.function_code, adu.request);
                match execute(&self.store, &adu.request).await {
                    Ok(data) => Response::Data(data),
                    Err(code) => Response::Exception(ExceptionResponse {
                        function_code: msg.function_code,
                        code,
                    }),
                }
            }
            Err(ex) => Response::Exception(ex),
        };

        if let Response::Exception(ex) = &response {
            tracing::debug!("TX - {} exception: {}", ex.function_code, ex.code);
        }

        ResponseAdu {
            transaction_id: msg.transaction_id,
            unit_id: msg.unit_id,
            response,
        }
    }
}

fn failure_reply(msg: &Message) -> ResponseAdu {
    ResponseAdu {
        transaction_id: msg.transaction_id,
        unit_id: msg.unit_id,
        response: Response::Exception(ExceptionResponse {
            function_code: msg.function_code,
            code: ModbusException::ServerDeviceFailure,
        }),
    }
}

pub(crate) async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop {
            return;
        }
        if shutdown.changed().await.is_err() {
            return; // server dropped
        }
    }
}

/// Maps a request onto the store. Clients may only write coils and holding registers.
pub async fn execute(store: &RegisterStore, request: &Request) -> Result<DataResponse, ModbusException> {
    let response = match request {
        Request::ReadCoils(req) => DataResponse::ReadCoils(store.read_bits(BitBank::Coils, req.address, req.length).await?),
        Request::ReadDiscreteInputs(req) => {
            DataResponse::ReadDiscreteInputs(store.read_bits(BitBank::DiscreteInputs, req.address, req.length).await?)
        }
        Request::ReadHoldingRegisters(req) => {
            DataResponse::ReadHoldingRegisters(store.read_registers(RegisterBank::HoldingRegisters, req.address, req.length).await?)
        }
        Request::ReadInputRegisters(req) => {
            DataResponse::ReadInputRegisters(store.read_registers(RegisterBank::InputRegisters, req.address, req.length).await?)
        }
        Request::WriteSingleCoil(req) => {
            store.write_bits(BitBank::Coils, req.address, &[req.value]).await?;
            DataResponse::WriteSingleCoil(*req)
        }
        Request::WriteSingleHoldingRegister(req) => {
            store.write_registers(RegisterBank::HoldingRegisters, req.address, &[req.value]).await?;
            DataResponse::WriteSingleHoldingRegister(*req)
        }
        Request::WriteMultipleCoils(req) => {
            store.write_bits(BitBank::Coils, req.address, &req.values).await?;
            DataResponse::WriteMultipleCoils(WriteMultipleResponse {
                address: req.address,
                length: req.values.len() as u16,
            })
        }
        Request::WriteMultipleHoldingRegisters(req) => {
            store.write_registers(RegisterBank::HoldingRegisters, req.address, &req.values).await?;
            DataResponse::WriteMultipleHoldingRegisters(WriteMultipleResponse {
                address: req.address,
                length: req.values.len() as u16,
            })
        }
    };
    Ok(response)
}
