//! L2CAP channel lifecycle and signalling (components B/C, `§4.1`, `§4.5`).

pub mod channel;
pub mod codec;
pub mod consts;

pub use channel::{Channel, ChannelState, ChannelTable};
pub use consts::{Psm, SignalCode, FIRST_LOCAL_CID, MTU_DEFAULT, NULL_CID, SIGNAL_CID};
