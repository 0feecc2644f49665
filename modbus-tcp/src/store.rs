//! In-memory device model shared by every session.
//!
//! Each bank sits behind its own lock. A request only ever touches one bank, so holding that
//! bank's lock for the whole read or write is enough for every operation to appear atomic.

use tokio::sync::RwLock;

use crate::{consts::BANK_MAX_SIZE, modbus_exception::ModbusException};

/// Single-bit banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitBank {
    Coils,
    DiscreteInputs,
}

/// 16-bit banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterBank {
    HoldingRegisters,
    InputRegisters,
}

/// Capacity of each bank, fixed when the store is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankSizes {
    pub coils: usize,
    pub discrete_inputs: usize,
    pub holding_registers: usize,
    pub input_registers: usize,
}

impl BankSizes {
    pub fn uniform(size: usize) -> Self {
        Self {
            coils: size,
            discrete_inputs: size,
            holding_registers: size,
            input_registers: size,
        }
    }
}

impl Default for BankSizes {
    fn default() -> Self {
        Self {
            coils: 2000,
            discrete_inputs: 1968,
            holding_registers: 125,
            input_registers: 121,
        }
    }
}

/// The four banks of a Modbus device, zero initialised.
#[derive(Debug)]
pub struct RegisterStore {
    coils: RwLock<Vec<bool>>,
    discrete_inputs: RwLock<Vec<bool>>,
    holding_registers: RwLock<Vec<u16>>,
    input_registers: RwLock<Vec<u16>>,
}

impl RegisterStore {
    /// Sizes above the 16-bit address space are clamped to it.
    pub fn new(sizes: BankSizes) -> Self {
        Self {
            coils: RwLock::new(vec![false; sizes.coils.min(BANK_MAX_SIZE)]),
            discrete_inputs: RwLock::new(vec![false; sizes.discrete_inputs.min(BANK_MAX_SIZE)]),
            holding_registers: RwLock::new(vec![0; sizes.holding_registers.min(BANK_MAX_SIZE)]),
            input_registers: RwLock::new(vec![0; sizes.input_registers.min(BANK_MAX_SIZE)]),
        }
    }

    pub async fn sizes(&self) -> BankSizes {
        BankSizes {
            coils: self.coils.read().await.len(),
            discrete_inputs: self.discrete_inputs.read().await.len(),
            holding_registers: self.holding_registers.read().await.len(),
            input_registers: self.input_registers.read().await.len(),
        }
    }

    pub async fn read_bits(&self, bank: BitBank, address: u16, length: u16) -> Result<Vec<bool>, ModbusException> {
        let values = self.bit_bank(bank).read().await;
        read_range(&values, address, length)
    }

    /// Either every value is written or, on error, none is.
    pub async fn write_bits(&self, bank: BitBank, address: u16, values: &[bool]) -> Result<(), ModbusException> {
        let mut bank = self.bit_bank(bank).write().await;
        write_range(&mut bank, address, values)
    }

    pub async fn read_registers(&self, bank: RegisterBank, address: u16, length: u16) -> Result<Vec<u16>, ModbusException> {
        let values = self.register_bank(bank).read().await;
        read_range(&values, address, length)
    }

    /// Either every value is written or, on error, none is.
    pub async fn write_registers(&self, bank: RegisterBank, address: u16, values: &[u16]) -> Result<(), ModbusException> {
        let mut bank = self.register_bank(bank).write().await;
        write_range(&mut bank, address, values)
    }

    fn bit_bank(&self, bank: BitBank) -> &RwLock<Vec<bool>> {
        match bank {
            BitBank::Coils => &self.coils,
            BitBank::DiscreteInputs => &self.discrete_inputs,
        }
    }

    fn register_bank(&self, bank: RegisterBank) -> &RwLock<Vec<u16>> {
        match bank {
            RegisterBank::HoldingRegisters => &self.holding_registers,
            RegisterBank::InputRegisters => &self.input_registers,
        }
    }
}

impl Default for RegisterStore {
    fn default() -> Self {
        Self::new(BankSizes::default())
    }
}

fn checked_range(capacity: usize, address: u16, length: usize) -> Result<std::ops::Range<usize>, ModbusException> {
    if length == 0 {
        return Err(ModbusException::IllegalDataValue);
    }
    let start = address as usize;
    let end = start + length;
    if end > capacity {
        return Err(ModbusException::IllegalDataAddress);
    }
    Ok(start..end)
}

fn read_range<T: Copy>(values: &[T], address: u16, length: u16) -> Result<Vec<T>, ModbusException> {
    let range = checked_range(values.len(), address, length as usize)?;
    Ok(values[range].to_vec())
}

fn write_range<T: Copy>(bank: &mut [T], address: u16, values: &[T]) -> Result<(), ModbusException> {
    let range = checked_range(bank.len(), address, values.len())?;
    bank[range].copy_from_slice(values);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounds_are_checked_per_bank() {
        let store = RegisterStore::new(BankSizes {
            coils: 8,
            discrete_inputs: 16,
            holding_registers: 10,
            input_registers: 4,
        });

        assert_eq!(store.read_registers(RegisterBank::HoldingRegisters, 9, 1).await, Ok(vec![0]));
        assert_eq!(
            store.read_registers(RegisterBank::HoldingRegisters, 10, 1).await,
            Err(ModbusException::IllegalDataAddress)
        );
        assert_eq!(
            store.read_registers(RegisterBank::HoldingRegisters, 0, 11).await,
            Err(ModbusException::IllegalDataAddress)
        );
        assert_eq!(store.read_registers(RegisterBank::InputRegisters, 3, 1).await, Ok(vec![0]));
        assert_eq!(
            store.read_registers(RegisterBank::InputRegisters, 4, 1).await,
            Err(ModbusException::IllegalDataAddress)
        );
        assert_eq!(store.read_bits(BitBank::Coils, 7, 1).await, Ok(vec![false]));
        assert_eq!(store.read_bits(BitBank::Coils, 8, 1).await, Err(ModbusException::IllegalDataAddress));
        assert_eq!(store.read_bits(BitBank::DiscreteInputs, 0, 16).await.map(|v| v.len()), Ok(16));
        assert_eq!(
            store.read_bits(BitBank::DiscreteInputs, 0xFFFF, 2).await,
            Err(ModbusException::IllegalDataAddress)
        );
    }

    #[tokio::test]
    async fn zero_length_is_illegal_data_value() {
        let store = RegisterStore::new(BankSizes::uniform(4));
        assert_eq!(store.read_bits(BitBank::Coils, 0, 0).await, Err(ModbusException::IllegalDataValue));
        assert_eq!(
            store.write_registers(RegisterBank::HoldingRegisters, 0, &[]).await,
            Err(ModbusException::IllegalDataValue)
        );
    }

    #[tokio::test]
    async fn failed_writes_leave_the_bank_untouched() {
        let store = RegisterStore::new(BankSizes::uniform(4));
        store.write_registers(RegisterBank::HoldingRegisters, 0, &[1, 2, 3, 4]).await.unwrap();

        assert_eq!(
            store.write_registers(RegisterBank::HoldingRegisters, 2, &[9, 9, 9]).await,
            Err(ModbusException::IllegalDataAddress)
        );
        assert_eq!(store.read_registers(RegisterBank::HoldingRegisters, 0, 4).await, Ok(vec![1, 2, 3, 4]));
    }

    #[tokio::test]
    async fn writes_are_idempotent() {
        let store = RegisterStore::new(BankSizes::uniform(4));
        store.write_bits(BitBank::Coils, 1, &[true, true]).await.unwrap();
        let once = store.read_bits(BitBank::Coils, 0, 4).await.unwrap();
        store.write_bits(BitBank::Coils, 1, &[true, true]).await.unwrap();
        assert_eq!(store.read_bits(BitBank::Coils, 0, 4).await.unwrap(), once);
        assert_eq!(once, vec![false, true, true, false]);
    }

    #[tokio::test]
    async fn oversized_banks_are_clamped() {
        let store = RegisterStore::new(BankSizes::uniform(100_000));
        assert_eq!(store.sizes().await, BankSizes::uniform(BANK_MAX_SIZE));
        assert_eq!(store.read_registers(RegisterBank::InputRegisters, 0xFFFF, 1).await, Ok(vec![0]));
    }
}
