//! HCI wire constants relevant to a BR/EDR fake-peripheral link: the three
//! host-originated commands this core dispatches (`§4.8`), the events it
//! emits in response, and the handful of status/role codes those events
//! carry.

/// HCI command header and event header sizes ([Vol 4] Part E, Section 5.4).
pub(super) const CMD_HDR: usize = 3;
pub(super) const EVT_HDR: usize = 2;

/// HCI command opcodes this core decodes from the host.
#[derive(Clone, Copy, Debug, Eq, PartialEq, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[non_exhaustive]
#[repr(u16)]
pub enum Opcode {
    /// Unrecognised opcode; the inbound command is ignored (`§4.8`).
    #[num_enum(default)]
    Unknown = 0x0000,
    /// `HCI_Accept_Connection_Request` ([Vol 4] Part E, Section 7.1.8).
    AcceptConnectionRequest = 0x0409,
    /// `HCI_Reject_Connection_Request` ([Vol 4] Part E, Section 7.1.9).
    RejectConnectionRequest = 0x040A,
    /// `HCI_Disconnect` ([Vol 4] Part E, Section 7.1.6).
    Disconnect = 0x0406,
}

/// HCI event codes this core emits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum EventCode {
    /// `HCI_Command_Status`.
    CommandStatus = 0x0F,
    /// `HCI_Connection_Complete`.
    ConnectionComplete = 0x03,
    /// `HCI_Disconnection_Complete`.
    DisconnectionComplete = 0x05,
    /// `HCI_Role_Change`.
    RoleChange = 0x12,
}

/// HCI status/error codes ([Vol 1] Part F).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(transparent)]
pub struct Status(pub u8);

impl Status {
    /// `HCI_SUCCESS`.
    pub const SUCCESS: Self = Self(0x00);

    /// Returns whether this status indicates success.
    #[inline]
    #[must_use]
    pub const fn is_ok(self) -> bool {
        self.0 == 0x00
    }
}

/// Link role carried by `Accept_Connection_Request` and `HCI_Role_Change`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Role {
    /// Central/master role.
    Master = 0x00,
    /// Peripheral/slave role.
    Slave = 0x01,
}

impl Role {
    /// Decodes a raw role byte, defaulting to `Slave` for unrecognised
    /// values (the fake peripheral never initiates a role change itself).
    #[inline]
    #[must_use]
    pub const fn from_u8(b: u8) -> Self {
        match b {
            0x00 => Self::Master,
            _ => Self::Slave,
        }
    }
}

/// `HCI_Disconnect` reason used by this core when tearing a session down on
/// its own initiative (`disconnect`, `§3` lifecycle).
pub const REASON_USER_ENDED_CONNECTION: u8 = 0x13;

/// Link type requested in `hci_request_connection` for every fake Wiimote:
/// an ACL (data) link, never SCO.
pub const LINK_TYPE_ACL: u8 = 0x01;

/// Class-of-device bytes identifying a Wii Remote to a scanning host
/// ([CSS] Part A / Bluetooth SIG assigned numbers for HID peripherals).
pub const WIIMOTE_HCI_CLASS: [u8; 3] = [0x04, 0x25, 0x00];
