//! HCI baseband establishment for a single fake Wiimote (`§4.1`, `§4.8`).
//!
//! This core never speaks HCI as a *host*: it is the peripheral side,
//! decoding the handful of commands a host issues to accept/reject/drop a
//! connection and encoding the events that report baseband progress.

pub mod codec;
pub mod conn;
pub mod consts;

pub use codec::{
    decode_command, encode_command_status, encode_connection_complete,
    encode_disconnection_complete, encode_role_change, HciCommand,
};
pub use conn::ConnHandle;
pub use consts::{
    EventCode, Opcode, Role, Status, LINK_TYPE_ACL, REASON_USER_ENDED_CONNECTION,
    WIIMOTE_HCI_CLASS,
};
