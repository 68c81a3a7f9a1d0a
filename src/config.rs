//! Implementation-chosen constants that the distilled specification leaves
//! open (`MAX_FAKE_WIIMOTES`, requested MTU, flush timeout, EEPROM size).

use serde::{Deserialize, Serialize};

/// Tunable constants for a [`crate::Manager`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of simultaneously active fake Wiimote sessions.
    pub max_sessions: usize,
    /// MTU requested in every `L2CAP_CONFIG_REQ` this crate emits.
    pub request_mtu: u16,
    /// Flush timeout advertised in `L2CAP_CONFIG_REQ` (`0xFFFF` = none; the
    /// transport this crate sits on never drops packets, so this is
    /// advisory only, per `§4.5`).
    pub flush_timeout_ms: u16,
    /// Size in bytes of the user-addressable EEPROM window.
    pub eeprom_free_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_sessions: 4,
            request_mtu: 185,
            flush_timeout_ms: 0xFFFF,
            eeprom_free_size: 0x1700,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file, falling back to
    /// [`Config::default`] field values for anything the file omits.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = Config::from_toml_str("max_sessions = 2\n").unwrap();
        assert_eq!(cfg.max_sessions, 2);
        assert_eq!(cfg.request_mtu, Config::default().request_mtu);
    }
}
