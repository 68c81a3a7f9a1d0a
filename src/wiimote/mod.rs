//! The fake Wiimote: extension register file, EEPROM, and the session
//! state machine built on top of them (components B and D, `§3`, `§4`).

pub mod eeprom;
pub mod extension;
pub mod regs;
mod session;

pub use extension::Extension;
pub use session::{
    AclState, BasebandState, DisconnectOutcome, Session, SessionCallbacks, EEPROM_I2C_ADDR,
    EXTENSION_I2C_ADDR, SPACE_EEPROM, SPACE_I2C_BUS, SPACE_I2C_BUS_ALT,
};
