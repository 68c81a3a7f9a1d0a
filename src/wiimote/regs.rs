//! Extension register file (component B, `§4.2`).
//!
//! A 256-byte byte-addressable window with an encryption window and a
//! derived-key cache, mirroring `extension_read_data`/`extension_write_data`
//! in the original manager.

use fakewiimote_crypto::Key;

use crate::error::{Error, MemoryError, Result};

/// Size of the extension register window.
pub const SIZE: usize = 256;

/// Offset and length of the extension's live input payload.
pub const CONTROLLER_DATA_BEGIN: usize = 0x00;
pub const CONTROLLER_DATA_SIZE: usize = 21;

/// Offset and length of the 16-byte encryption key seed.
pub const ENCRYPTION_KEY_DATA_BEGIN: usize = 0x40;
pub const ENCRYPTION_KEY_DATA_END: usize = ENCRYPTION_KEY_DATA_BEGIN + 16;

/// Offset of the encryption enable/disable flag byte.
pub const ENCRYPTION_FLAG_OFFSET: usize = 0xF0;
/// Value of the encryption flag byte that enables the stream cipher.
pub const ENCRYPTION_ENABLED: u8 = 0xAA;

/// Offset and length of the 6-byte extension identifier.
pub const IDENTIFIER_BEGIN: usize = 0xFA;
pub const IDENTIFIER_SIZE: usize = 6;

/// The extension register window (`extension_regs` in `§3`).
#[derive(Clone, Debug)]
pub struct ExtensionRegisters {
    data: [u8; SIZE],
    key: Key,
    key_dirty: bool,
}

impl Default for ExtensionRegisters {
    fn default() -> Self {
        Self {
            data: [0; SIZE],
            key: Key::default(),
            key_dirty: true,
        }
    }
}

impl ExtensionRegisters {
    /// Returns the 6-byte identifier currently materialised in the window.
    #[must_use]
    pub fn identifier(&self) -> [u8; IDENTIFIER_SIZE] {
        let mut id = [0; IDENTIFIER_SIZE];
        id.copy_from_slice(&self.data[IDENTIFIER_BEGIN..IDENTIFIER_BEGIN + IDENTIFIER_SIZE]);
        id
    }

    /// Overwrites the 6-byte identifier, used when an extension change is
    /// materialised (`§4.1`, invariant 4).
    pub fn set_identifier(&mut self, id: [u8; IDENTIFIER_SIZE]) {
        self.data[IDENTIFIER_BEGIN..IDENTIFIER_BEGIN + IDENTIFIER_SIZE].copy_from_slice(&id);
    }

    /// Overwrites the live controller-data payload (written by the input
    /// decode path, read back by the reporting path).
    pub fn set_controller_data(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(CONTROLLER_DATA_SIZE);
        self.data[CONTROLLER_DATA_BEGIN..CONTROLLER_DATA_BEGIN + n].copy_from_slice(&bytes[..n]);
    }

    /// Returns the live controller-data payload.
    #[must_use]
    pub fn controller_data(&self) -> &[u8] {
        &self.data[CONTROLLER_DATA_BEGIN..CONTROLLER_DATA_BEGIN + CONTROLLER_DATA_SIZE]
    }

    /// Returns the first `len` bytes of the live controller-data payload,
    /// for comparing against a driver's freshly decoded payload before
    /// overwriting it (`Session::set_extension_payload`'s dirty-diffing).
    #[must_use]
    pub fn controller_data_prefix(&self, len: usize) -> &[u8] {
        &self.controller_data()[..len.min(CONTROLLER_DATA_SIZE)]
    }

    /// Whether the encryption flag byte currently enables the cipher.
    #[must_use]
    pub fn encryption_enabled(&self) -> bool {
        self.data[ENCRYPTION_FLAG_OFFSET] == ENCRYPTION_ENABLED
    }

    /// Reads `size` bytes at `addr` into `dst`, post-processing with the
    /// stream cipher if encryption is enabled (`§4.2`).
    pub fn read_data(&mut self, dst: &mut [u8], addr: u16, size: u16) -> Result<()> {
        let (addr, size) = (usize::from(addr), usize::from(size));
        if addr + size > SIZE {
            return Err(Error::MemorySpace(MemoryError::InvalidAddress));
        }
        dst[..size].copy_from_slice(&self.data[addr..addr + size]);
        if self.encryption_enabled() {
            if self.key_dirty {
                let mut seed = [0_u8; 16];
                seed.copy_from_slice(
                    &self.data[ENCRYPTION_KEY_DATA_BEGIN..ENCRYPTION_KEY_DATA_END],
                );
                self.key = Key::from_seed(&seed);
                self.key_dirty = false;
            }
            #[allow(clippy::cast_possible_truncation)]
            self.key.encrypt(&mut dst[..size], addr as u16);
        }
        Ok(())
    }

    /// Writes `size` bytes from `src` at `addr`; writes are never
    /// encrypted. Marks the derived key stale if the write overlaps the
    /// key-seed window (`§4.2`).
    pub fn write_data(&mut self, src: &[u8], addr: u16, size: u16) -> Result<()> {
        let (addr, size) = (usize::from(addr), usize::from(size));
        if addr + size > SIZE {
            return Err(Error::MemorySpace(MemoryError::InvalidAddress));
        }
        if addr < ENCRYPTION_KEY_DATA_END && addr + size > ENCRYPTION_KEY_DATA_BEGIN {
            self.key_dirty = true;
        }
        self.data[addr..addr + size].copy_from_slice(&src[..size]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_without_encryption() {
        let mut regs = ExtensionRegisters::default();
        let written = [1, 2, 3, 4, 5];
        regs.write_data(&written, 0x10, 5).unwrap();
        let mut read = [0_u8; 5];
        regs.read_data(&mut read, 0x10, 5).unwrap();
        assert_eq!(read, written);
    }

    #[test]
    fn oversize_access_is_rejected() {
        let mut regs = ExtensionRegisters::default();
        let mut buf = [0_u8; 4];
        assert!(regs.read_data(&mut buf, 254, 4).is_err());
    }

    #[test]
    fn writing_key_window_marks_key_dirty_and_round_trips_when_decrypted() {
        let mut regs = ExtensionRegisters::default();
        regs.write_data(&[0xAA; 16], ENCRYPTION_KEY_DATA_BEGIN as u16, 16)
            .unwrap();
        regs.data[ENCRYPTION_FLAG_OFFSET] = ENCRYPTION_ENABLED;
        let written = [9, 9, 9, 9];
        regs.write_data(&written, 0x00, 4).unwrap();
        let mut read = [0_u8; 4];
        regs.read_data(&mut read, 0x00, 4).unwrap();
        assert_ne!(read, written, "encrypted read must differ from plaintext");
    }
}
