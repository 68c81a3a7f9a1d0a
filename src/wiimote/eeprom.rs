//! User-addressable EEPROM window (`§4.2`).

use crate::error::{Error, MemoryError, Result};

/// The EEPROM address space backing `WRITE_DATA`/`READ_DATA` output reports
/// when `space == EEPROM`. Unlike [`super::regs::ExtensionRegisters`] this
/// window has no encryption semantics.
#[derive(Clone, Debug)]
pub struct Eeprom {
    data: Vec<u8>,
}

impl Eeprom {
    /// Creates a zero-filled window of `size` bytes.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    /// Total addressable size.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the window has zero size.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reads `size` bytes starting at `addr`.
    pub fn read_data(&self, dst: &mut [u8], addr: u32, size: u16) -> Result<()> {
        let (addr, size) = (addr as usize, usize::from(size));
        if addr + size > self.data.len() {
            return Err(Error::MemorySpace(MemoryError::InvalidAddress));
        }
        dst[..size].copy_from_slice(&self.data[addr..addr + size]);
        Ok(())
    }

    /// Writes `size` bytes starting at `addr`.
    pub fn write_data(&mut self, src: &[u8], addr: u32, size: u16) -> Result<()> {
        let (addr, size) = (addr as usize, usize::from(size));
        if addr + size > self.data.len() {
            return Err(Error::MemorySpace(MemoryError::InvalidAddress));
        }
        self.data[addr..addr + size].copy_from_slice(&src[..size]);
        Ok(())
    }
}
