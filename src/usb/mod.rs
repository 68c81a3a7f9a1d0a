//! USB input-device driver framework (component G, `§4.6`).

pub mod drivers;

use std::fmt;

use crate::error::{Error, Result};
use crate::wiimote::Session;

/// Largest vendor HID report this crate's drivers decode (DS4 over
/// Bluetooth is the widest at 64 bytes; wired/USB reports are smaller).
pub const MAX_REPORT_SIZE: usize = 64;

/// The four driver entry points plus the two per-session callbacks that
/// piggyback on the same object (`§4.6`, `§6`).
pub trait Driver: fmt::Debug {
    /// Called once, right after the owning session is created. Typically
    /// sets an initial extension and schedules the first interrupt-in
    /// transfer (left to the embedder; this crate only models the state
    /// update).
    fn init(&mut self, session: &mut Session) -> Result<()>;

    /// Called when the USB device is unplugged, or when the Bluetooth-side
    /// session tears down while its HID-Interrupt channel was live.
    fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Updates a visible slot indicator (LED/colour) on the physical pad.
    fn slot_changed(&mut self, _slot: usize) -> Result<()> {
        Ok(())
    }

    /// Decodes one interrupt-in completion and updates `session`.
    fn async_response(&mut self, session: &mut Session, report: &[u8]) -> Result<()>;

    /// Called on a Wiimote `LED` output report (`§6`: `set_leds(usrdata, …)`).
    fn set_leds(&mut self, _leds: u8) {}

    /// Called exactly once, after both HID channels are `Complete`
    /// (`§6`: `assigned(usrdata, session)`).
    fn assigned(&mut self) {}
}

/// One attached USB gamepad (`§3` "USB device record").
#[derive(Debug)]
pub struct Device {
    /// USB vendor ID.
    pub vid: u16,
    /// USB product ID.
    pub pid: u16,
    /// The driver instance decoding this device's reports.
    pub driver: Box<dyn Driver>,
}

/// Resolves a driver for `(vid, pid)`, or `Err(Error::NoDriver)` if the
/// device is unsupported (`§4.7`, `§9`(c)).
pub fn make_driver(vid: u16, pid: u16) -> Result<Box<dyn Driver>> {
    use drivers::{ds3, ds4, xbox_one};
    match (vid, pid) {
        (ds3::VID, ds3::PID) => Ok(Box::new(ds3::Ds3Driver::default())),
        (ds4::VID, ds4::PID_V1 | ds4::PID_V2) => Ok(Box::new(ds4::Ds4Driver::default())),
        (xbox_one::VID, xbox_one::PID) => Ok(Box::new(xbox_one::XboxOneDriver::default())),
        _ => Err(Error::NoDriver { vid, pid }),
    }
}
