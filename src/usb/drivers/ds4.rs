//! Sony DualShock 4 driver (`§4.7`, `§9`(c)).

use crate::error::Result;
use crate::hid::Buttons;
use crate::wiimote::{Extension, Session};

use super::{dpad_bits, nunchuk_invert, SLOT_INDICATORS};

/// Sony USB vendor ID.
pub const VID: u16 = 0x054c;
/// Original DualShock 4 product ID.
pub const PID_V1: u16 = 0x05c4;
/// Revised (v2) DualShock 4 product ID.
pub const PID_V2: u16 = 0x09cc;

mod report {
    pub const LEFT_X: usize = 1;
    pub const LEFT_Y: usize = 2;
    pub const BUTTONS_1: usize = 5;
    pub const BUTTONS_2: usize = 6;
    pub const BUTTONS_3: usize = 7;
}

#[derive(Debug, Default)]
pub struct Ds4Driver {
    slot: usize,
}

impl super::super::Driver for Ds4Driver {
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
        let b1 = data[report::BUTTONS_1];
        let mut buttons = dpad_bits(b1 & 0x0F);
        if b1 & 0x10 != 0 {
            buttons |= Buttons::ONE; // Square
        }
        if b1 & 0x20 != 0 {
            buttons |= Buttons::A; // Cross
        }
        if b1 & 0x40 != 0 {
            buttons |= Buttons::B; // Circle
        }
        if b1 & 0x80 != 0 {
            buttons |= Buttons::TWO; // Triangle
        }
        let b2 = data[report::BUTTONS_2];
        if b2 & 0x20 != 0 {
            buttons |= Buttons::MINUS; // Share
        }
        if b2 & 0x40 != 0 {
            buttons |= Buttons::PLUS; // Options
        }
        let b3 = data[report::BUTTONS_3];
        if b3 & 0x01 != 0 {
            buttons |= Buttons::HOME; // PS button
        }
        session.set_buttons(buttons.bits());

        let l1_pressed = b2 & 0x01 != 0;
        let l2_pressed = b2 & 0x04 != 0;
        let c_and_z = u8::from(!l2_pressed) | (u8::from(!l1_pressed) << 1);
        let nunchuk = [
            data[report::LEFT_X],
            nunchuk_invert(data[report::LEFT_Y]),
            0,
            0,
            c_and_z,
        ];
        session.set_extension_payload(&nunchuk);
        Ok(())
    }
}
