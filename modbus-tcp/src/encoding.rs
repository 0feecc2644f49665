//! Big-endian field codec shared by frames and PDUs.

use std::num::TryFromIntError;

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// A value does not fit the wire field it is written to.
#[derive(Error, PartialEq, Debug, Clone, Copy)]
pub enum EncodeError {
    #[error("value overflows its wire field")]
    Overflow,
}

impl From<TryFromIntError> for EncodeError {
    fn from(_: TryFromIntError) -> Self {
        Self::Overflow
    }
}

pub type EncodeResult = Result<(), EncodeError>;

pub trait Encodable {
    fn encode(&self, encoder: &mut Encoder) -> EncodeResult;

    fn encode_to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        let mut encoder = Encoder::default();
        self.encode(&mut encoder)?;
        Ok(encoder.finish())
    }
}

#[derive(Default)]
pub struct Encoder {
    buffer: BytesMut,
}

impl Encoder {
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.put_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buffer.put_u16(value);
    }

    /// Packs bits LSB first, the last byte zero padded.
    pub fn write_bools(&mut self, values: &[bool]) {
        for chunk in values.chunks(8) {
            let byte = chunk
                .iter()
                .enumerate()
                .filter(|(_, value)| **value)
                .fold(0u8, |byte, (bit, _)| byte | (1 << bit));
            self.buffer.put_u8(byte);
        }
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        self.buffer.put_slice(value);
    }

    pub fn write_registers(&mut self, values: &[u16]) {
        self.buffer.reserve(values.len() * 2);
        values.iter().for_each(|v| self.buffer.put_u16(*v));
    }

    pub fn write_type<T>(&mut self, value: &T) -> EncodeResult
    where
        T: Encodable + ?Sized,
    {
        value.encode(self)
    }

    pub fn finish(self) -> Vec<u8> {
        Vec::from(self.buffer)
    }
}

#[derive(Error, PartialEq, Debug, Clone, Copy)]
pub enum DecodeError {
    /// The buffer ends before the value does.
    #[error("missing data")]
    MissingData,
    #[error("invalid data: {0}")]
    InvalidData(&'static str),
}

pub type DecodeResult<T> = Result<T, DecodeError>;

pub trait Decodable<T> {
    fn decode(decoder: &mut Decoder) -> DecodeResult<T>;

    fn decode_from_bytes(buffer: &[u8]) -> DecodeResult<T>
    where
        T: Decodable<T>,
    {
        Decoder::new(buffer).read_type()
    }
}

/// Reads fields from the front of a borrowed buffer. A read that does not fit consumes nothing.
pub struct Decoder<'a> {
    buffer: &'a [u8],
    consumed: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, consumed: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.consumed
    }

    pub fn remaining(&self) -> usize {
        self.buffer.remaining()
    }

    fn take(&mut self, length: usize) -> DecodeResult<&'a [u8]> {
        if self.buffer.remaining() < length {
            return Err(DecodeError::MissingData);
        }
        let (head, tail) = self.buffer.split_at(length);
        self.buffer = tail;
        self.consumed += length;
        Ok(head)
    }

    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.take(1)?.get_u8())
    }

    pub fn read_u16(&mut self) -> DecodeResult<u16> {
        Ok(self.take(2)?.get_u16())
    }

    /// Reads `length` bits packed LSB first, skipping the padding of the last byte.
    pub fn read_bools(&mut self, length: usize) -> DecodeResult<Vec<bool>> {
        let bytes = self.take(length.div_ceil(8))?;
        Ok((0..length).map(|i| bytes[i / 8] & (1 << (i % 8)) != 0).collect())
    }

    pub fn read_bytes(&mut self, length: usize) -> DecodeResult<Vec<u8>> {
        Ok(self.take(length)?.to_vec())
    }

    pub fn read_registers(&mut self, length: usize) -> DecodeResult<Vec<u16>> {
        let mut bytes = self.take(length * 2)?;
        Ok((0..length).map(|_| bytes.get_u16()).collect())
    }

    /// Fails if anything is left unread.
    pub fn expect_end(&self) -> DecodeResult<()> {
        match self.buffer.is_empty() {
            true => Ok(()),
            false => Err(DecodeError::InvalidData("Trailing bytes")),
        }
    }

    pub fn read_type<T>(&mut self) -> DecodeResult<T>
    where
        T: Decodable<T>,
    {
        T::decode(self)
    }
}
