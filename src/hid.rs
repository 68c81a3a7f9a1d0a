//! HID-over-L2CAP framing and the Wiimote input-report layout helpers
//! (component A, `§4.3`, `§6`).

use bitflags::bitflags;
use structbuf::Packer;

bitflags! {
    /// The Wiimote `buttons` wire bitfield (`§3`), shared by the core
    /// buttons report and the `STATUS`/`ACK` reports that echo it.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct Buttons: u16 {
        const LEFT  = 0x0001;
        const RIGHT = 0x0002;
        const DOWN  = 0x0004;
        const UP    = 0x0008;
        const PLUS  = 0x0010;
        const TWO   = 0x0100;
        const ONE   = 0x0200;
        const B     = 0x0400;
        const A     = 0x0800;
        const MINUS = 0x1000;
        const HOME  = 0x8000;
    }
}

/// HID transaction type, shifted into the high nibble of the framing byte.
const HID_TYPE_DATA: u8 = 0xA;
/// HID transaction parameter: input report.
const HID_PARAM_INPUT: u8 = 0x1;
/// HID transaction parameter: output report.
const HID_PARAM_OUTPUT: u8 = 0x2;

/// Framing byte prefixing every HID input report.
pub const FRAME_INPUT: u8 = (HID_TYPE_DATA << 4) | HID_PARAM_INPUT;
/// Framing byte prefixing every HID output report (received from host).
pub const FRAME_OUTPUT: u8 = (HID_TYPE_DATA << 4) | HID_PARAM_OUTPUT;

/// Wiimote input report IDs (`reporting_mode` values).
pub mod input_report {
    /// Sentinel: reporting disabled, no data reports are emitted (`§3`,
    /// invariant 6).
    pub const DISABLED: u8 = 0x00;
    /// Status report.
    pub const STATUS: u8 = 0x20;
    /// Memory read reply.
    pub const READ_DATA_REPLY: u8 = 0x21;
    /// Output-report acknowledgement.
    pub const ACK: u8 = 0x22;
    /// Core buttons only.
    pub const BTN: u8 = 0x30;
    /// Core buttons with 8 extension bytes.
    pub const BTN_EXT8: u8 = 0x32;
    /// Core buttons with 19 extension bytes.
    pub const BTN_EXT19: u8 = 0x34;
    /// 21 extension bytes, no buttons.
    pub const EXT21: u8 = 0x3D;
}

/// Wiimote output report IDs (commands from the host, `§4.4`).
pub mod output_report {
    pub const LED: u8 = 0x11;
    pub const REPORT_MODE: u8 = 0x12;
    pub const STATUS: u8 = 0x15;
    pub const WRITE_DATA: u8 = 0x16;
    pub const READ_DATA: u8 = 0x17;
}

/// Returns whether `mode`'s data report carries the 2-byte `buttons` field
/// (`§4.3`).
#[must_use]
pub const fn has_btn(mode: u8) -> bool {
    matches!(
        mode,
        input_report::BTN | input_report::BTN_EXT8 | input_report::BTN_EXT19
    )
}

/// Returns the number of extension bytes carried by `mode`'s data report.
#[must_use]
pub const fn ext_size(mode: u8) -> u8 {
    match mode {
        input_report::BTN_EXT8 => 8,
        input_report::BTN_EXT19 => 19,
        input_report::EXT21 => 21,
        _ => 0,
    }
}

/// Returns the byte offset of extension data within `mode`'s data report
/// body (after `has_btn`'s 2 button bytes, if present).
#[must_use]
pub const fn ext_offset(mode: u8) -> u8 {
    if has_btn(mode) {
        2
    } else {
        0
    }
}

/// Wraps `payload` (report-id byte + body) in the HID input-report framing
/// byte, ready to hand to L2CAP data send on the HID-Interrupt channel.
#[must_use]
pub fn frame_input_report(report_id: u8, body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + body.len());
    let mut p = Packer::new(&mut buf);
    p.u8(FRAME_INPUT).u8(report_id).put(body);
    buf
}

/// Builds the body of a `STATUS` (`0x20`) input report: buttons, a flags
/// byte with bit `0x02` set when an extension is present, three reserved
/// zero bytes, and a (fixed, motion/battery fidelity is a non-goal) battery
/// level (`§4.4`).
#[must_use]
pub fn status_report_body(buttons: u16, extension_present: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(7);
    let mut p = Packer::new(&mut buf);
    let flags = if extension_present { 0x02 } else { 0x00 };
    p.u16(buttons).u8(flags).u8(0).u8(0).u8(0).u8(0xFF);
    buf
}

/// Builds the body of an `ACK` (`0x22`) input report acknowledging output
/// report `acked_report_id` with `error` (`0` = success).
#[must_use]
pub fn ack_report_body(buttons: u16, acked_report_id: u8, error: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4);
    let mut p = Packer::new(&mut buf);
    p.u16(buttons).u8(acked_report_id).u8(error);
    buf
}

/// Builds the body of a `READ_DATA_REPLY` (`0x21`) input report: buttons, a
/// byte packing `size_minus_one` (high nibble) and `error` (low nibble), the
/// big-endian read address, and 16 bytes of (possibly short, zero-padded)
/// payload (`§4.2`).
#[must_use]
pub fn read_data_reply_body(buttons: u16, address: u16, size_minus_one: u8, error: u8, data: &[u8; 16]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(21);
    let mut p = Packer::new(&mut buf);
    p.u16(buttons)
        .u8((size_minus_one << 4) | (error & 0x0F))
        .u8((address >> 8) as u8)
        .u8((address & 0xFF) as u8)
        .put(data);
    buf
}
