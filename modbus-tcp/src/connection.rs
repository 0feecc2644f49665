use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::Mutex,
};

use crate::{encoding::*, message::Message};

/// A TCP stream carrying MBAP frames. Reading and writing lock separately so a reader
/// waiting for a frame never blocks a writer.
pub struct Connection {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    read_buffer: Mutex<BytesMut>,
}

#[derive(Error, Debug)]
pub enum ReadError {
    #[error(transparent)]
    IO(#[from] tokio::io::Error),
    /// The peer sent a header that can never be valid. The stream cannot be resynchronised.
    #[error("framing error: {0}")]
    Decode(DecodeError),
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error(transparent)]
    IO(#[from] tokio::io::Error),
    #[error("encoding error: {0}")]
    Encode(#[from] EncodeError),
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            read_buffer: Mutex::new(BytesMut::with_capacity(32)),
        }
    }

    /// Waits for the next complete frame. `Ok(None)` means the peer closed the stream.
    pub async fn read_message(&self) -> Result<Option<Message>, ReadError> {
        let mut reader = self.reader.lock().await;
        let mut read_buffer = self.read_buffer.lock().await;

        loop {
            let mut decoder = Decoder::new(&read_buffer);
            match decoder.read_type::<Message>() {
                Ok(msg) => {
                    let pos = decoder.position();
                    read_buffer.advance(pos);
                    return Ok(Some(msg));
                }
                Err(DecodeError::MissingData) => {} // wait for more data
                Err(err) => return Err(ReadError::Decode(err)),
            }

            let bytes_read = reader.read_buf(&mut *read_buffer).await?;

            if bytes_read == 0 {
                _ = self.writer.lock().await.shutdown().await;
                return Ok(None);
            }
        }
    }

    pub async fn write_message(&self, msg: &Message) -> Result<(), WriteError> {
        let bytes = msg.encode_to_bytes()?;

        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;

        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), std::io::Error> {
        self.writer.lock().await.shutdown().await
    }
}
