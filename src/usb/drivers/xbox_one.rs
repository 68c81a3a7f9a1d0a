//! Microsoft Xbox One wireless controller driver (`§4.7`, `§9`(c)), ported
//! from the original manager's `usb_driver_xbx1.c`.

use tracing::debug;

use crate::error::Result;
use crate::hid::Buttons;
use crate::wiimote::{Extension, Session};

use super::nunchuk_invert;

/// Microsoft USB vendor ID.
pub const VID: u16 = 0x045e;
/// Xbox One wireless controller product ID (via the Xbox Wireless dongle).
pub const PID: u16 = 0x02ea;

/// `xbx1_input_report::report_id` value for a button/axis update.
const REPORT_ID_INPUT: u8 = 0x01;

/// The 5-entry RGB colour table `xbx1_driver_ops_slot_changed` cycles
/// through (index 0 is "off").
const SLOT_COLOURS: [[u8; 3]; 5] = [
    [0, 0, 0],
    [0, 0, 255],
    [255, 0, 0],
    [0, 255, 0],
    [255, 0, 255],
];

/// Byte offsets within `struct xbx1_input_report`.
mod report {
    pub const LEFT_X: usize = 1;
    pub const LEFT_Y: usize = 2;
    /// `a:1, b:1, y:1, x:1, dpad:4`.
    pub const BUTTONS: usize = 5;
    /// `r3:1, l3:1, options:1, share:1, r2:1, l2:1, r1:1, l1:1`.
    pub const META: usize = 6;
    /// `cnt1:6, tpad:1, home:1`.
    pub const HOME: usize = 7;
}

/// `xbx1_map_buttons`: the D-pad hat (top nibble of [`report::BUTTONS`])
/// maps onto up to two Wiimote direction bits at once, plus the face and
/// meta buttons.
fn map_buttons(buttons_byte: u8, meta_byte: u8, home_byte: u8) -> Buttons {
    let dpad = buttons_byte >> 4;
    let mut out = Buttons::empty();
    if dpad == 0 || dpad == 1 || dpad == 7 {
        out |= Buttons::UP;
    } else if dpad == 3 || dpad == 4 || dpad == 5 {
        out |= Buttons::DOWN;
    }
    if dpad == 1 || dpad == 2 || dpad == 3 {
        out |= Buttons::RIGHT;
    } else if dpad == 5 || dpad == 6 || dpad == 7 {
        out |= Buttons::LEFT;
    }
    if buttons_byte & 0x01 != 0 {
        out |= Buttons::A;
    }
    if buttons_byte & 0x02 != 0 {
        out |= Buttons::B;
    }
    if buttons_byte & 0x04 != 0 {
        out |= Buttons::ONE; // y
    }
    if buttons_byte & 0x08 != 0 {
        out |= Buttons::TWO; // x
    }
    if home_byte & 0x80 != 0 {
        out |= Buttons::HOME;
    }
    if meta_byte & 0x08 != 0 {
        out |= Buttons::MINUS; // share
    }
    if meta_byte & 0x04 != 0 {
        out |= Buttons::PLUS; // options
    }
    out
}

/// `xbx1_set_leds_rumble`: builds the `0x05` LED/rumble output report. This
/// crate models USB input decoding only and has no outbound interrupt
/// transfer to actually issue it on, so the bytes are logged the way the
/// rest of the crate defers to `tracing` wherever there is no in-process
/// collaborator to hand a side effect to.
fn set_leds_rumble(r: u8, g: u8, b: u8) {
    let report = [0x05_u8, 0x03, 0x00, 0x00, 0x00, 0x00, r, g, b, 0x00, 0x00];
    debug!(?report, "xbx1_set_leds_rumble");
}

#[derive(Debug, Default)]
pub struct XboxOneDriver {
    slot: usize,
}

impl super::super::Driver for XboxOneDriver {
    fn init(&mut self, session: &mut Session) -> Result<()> {
        session.set_pending_extension(Extension::Nunchuk);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        set_leds_rumble(0, 0, 0);
        Ok(())
    }

    fn slot_changed(&mut self, slot: usize) -> Result<()> {
        self.slot = slot % SLOT_COLOURS.len();
        let [r, g, b] = SLOT_COLOURS[self.slot];
        set_leds_rumble(r, g, b);
        Ok(())
    }

    fn async_response(&mut self, session: &mut Session, data: &[u8]) -> Result<()> {
        if data.first() != Some(&REPORT_ID_INPUT) || data.len() <= report::HOME {
            return Ok(());
        }
        let buttons = map_buttons(data[report::BUTTONS], data[report::META], data[report::HOME]);
        session.set_buttons(buttons.bits());

        let l1 = data[report::META] & 0x80 != 0;
        let l2 = data[report::META] & 0x20 != 0;
        let c_and_z = u8::from(!l2) | (u8::from(!l1) << 1);
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
