//! Sony DualShock 3 driver (`§4.7`, `§9`(c)).

use crate::error::Result;
use crate::hid::Buttons;
use crate::wiimote::{Extension, Session};

use super::{dpad_bits, nunchuk_invert, SLOT_INDICATORS};

/// Sony USB vendor ID.
pub const VID: u16 = 0x054c;
/// DualShock 3 product ID.
pub const PID: u16 = 0x0268;

/// Byte offsets within the 49-byte Sixaxis HID input report.
mod report {
    pub const DPAD_AND_FACE: usize = 2;
    pub const SHOULDER_AND_PS: usize = 3;
    pub const PS_BUTTON: usize = 4;
    pub const LEFT_X: usize = 6;
    pub const LEFT_Y: usize = 7;
}

/// D-pad bit order used by the Sixaxis report (`Up,Right,Down,Left`
/// starting at bit 4 of [`report::DPAD_AND_FACE`]).
fn dpad_from_byte(b: u8) -> Buttons {
    let mut out = Buttons::empty();
    if b & 0x10 != 0 {
        out |= Buttons::UP;
    }
    if b & 0x20 != 0 {
        out |= Buttons::RIGHT;
    }
    if b & 0x40 != 0 {
        out |= Buttons::DOWN;
    }
    if b & 0x80 != 0 {
        out |= Buttons::LEFT;
    }
    out
}

#[derive(Debug, Default)]
pub struct Ds3Driver {
    slot: usize,
}

impl super::super::Driver for Ds3Driver {
    fn init(&mut self, session: &mut Session) -> Result<()> {
        session.set_pending_extension(Extension::Nunchuk);
        Ok(())
    }

    fn slot_changed(&mut self, slot: usize) -> Result<()> {
        self.slot = slot % SLOT_INDICATORS.len();
        Ok(())
    }

    fn async_response(&mut self, session: &mut Session, data: &[u8]) -> Result<()> {
        if data.first() != Some(&0x01) || data.len() < 8 {
            return Ok(());
        }
        let mut buttons = dpad_from_byte(data[report::DPAD_AND_FACE]);
        let face = data[report::SHOULDER_AND_PS];
        if face & 0x10 != 0 {
            buttons |= Buttons::TWO; // Triangle
        }
        if face & 0x20 != 0 {
            buttons |= Buttons::B; // Circle
        }
        if face & 0x40 != 0 {
            buttons |= Buttons::A; // Cross
        }
        if face & 0x80 != 0 {
            buttons |= Buttons::ONE; // Square
        }
        if data[report::DPAD_AND_FACE] & 0x08 != 0 {
            buttons |= Buttons::PLUS; // Start
        }
        if data[report::DPAD_AND_FACE] & 0x01 != 0 {
            buttons |= Buttons::MINUS; // Select
        }
        if data[report::PS_BUTTON] & 0x01 != 0 {
            buttons |= Buttons::HOME; // PS button
        }
        session.set_buttons(buttons.bits());

        let l1_pressed = face & 0x04 != 0;
        let l2_pressed = face & 0x01 != 0;
        let c_and_z = u8::from(!l2_pressed) | (u8::from(!l1_pressed) << 1);
        let nunchuk = [
            data[report::LEFT_X],
            nunchuk_invert(data[report::LEFT_Y]),
            0, // accelerometer axes: motion fidelity is out of scope
            0,
            c_and_z,
        ];
        session.set_extension_payload(&nunchuk);
        Ok(())
    }
}
