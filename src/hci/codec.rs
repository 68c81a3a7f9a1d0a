//! Encoders for the HCI events this core emits and decoders for the HCI
//! commands it accepts from the host (`§4.8`, `§6`).

use structbuf::{Packer, Unpacker};

use crate::addr::BdAddr;
use crate::error::{Error, Result};

use super::consts::{EventCode, Opcode, Role, Status, CMD_HDR, EVT_HDR};
use super::conn::ConnHandle;

/// Host-originated commands this core recognises (`§4.8`).
#[derive(Clone, Copy, Debug)]
pub enum HciCommand {
    /// `HCI_Accept_Connection_Request(bd_addr, role)`.
    AcceptConnectionRequest { bd_addr: BdAddr, role: Role },
    /// `HCI_Reject_Connection_Request(bd_addr, reason)`.
    RejectConnectionRequest { bd_addr: BdAddr, reason: Status },
    /// `HCI_Disconnect(con_handle, reason)`.
    Disconnect { handle: ConnHandle, reason: Status },
    /// Any other opcode; ignored by the dispatcher.
    Unknown,
}

/// Decodes a full HCI command packet: 3-byte header (`opcode:u16`,
/// `length:u8`) followed by `length` bytes of parameters.
pub fn decode_command(pkt: &[u8]) -> Result<HciCommand> {
    if pkt.len() < CMD_HDR {
        return Err(Error::Malformed {
            context: "hci command header",
        });
    }
    let mut hdr = Unpacker::new(pkt);
    let opcode = Opcode::from(hdr.u16());
    let len = usize::from(hdr.u8());
    let mut params = Unpacker::new(&pkt[CMD_HDR..]);
    if params.len() < len {
        return Err(Error::Malformed {
            context: "hci command length",
        });
    }
    Ok(match opcode {
        Opcode::AcceptConnectionRequest => {
            // SAFETY: `[u8; 6]` is valid for all bit patterns.
            let bd_addr = BdAddr::new(unsafe { params.read() });
            let role = Role::from_u8(params.u8());
            HciCommand::AcceptConnectionRequest { bd_addr, role }
        }
        Opcode::RejectConnectionRequest => {
            // SAFETY: `[u8; 6]` is valid for all bit patterns.
            let bd_addr = BdAddr::new(unsafe { params.read() });
            let reason = Status(params.u8());
            HciCommand::RejectConnectionRequest { bd_addr, reason }
        }
        Opcode::Disconnect => {
            let handle = ConnHandle::new(params.u16());
            let reason = Status(params.u8());
            HciCommand::Disconnect { handle, reason }
        }
        Opcode::Unknown => HciCommand::Unknown,
    })
}

fn event_header(code: EventCode, param_len: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(EVT_HDR + usize::from(param_len));
    let mut p = Packer::new(&mut buf);
    p.u8(code as u8).u8(param_len);
    buf
}

/// Encodes `HCI_Command_Status` for `opcode`, always with `Status::SUCCESS`
/// and a command quota of 1 (single-threaded cooperative core, `§5`).
#[must_use]
pub fn encode_command_status(opcode: Opcode) -> Vec<u8> {
    let mut buf = event_header(EventCode::CommandStatus, 4);
    let mut p = Packer::new(&mut buf);
    p.u8(Status::SUCCESS.0).u8(1).u16(u16::from(opcode));
    buf
}

/// Encodes `HCI_Connection_Complete(status, handle, bd_addr, link_type,
/// encryption_enabled=0)`.
#[must_use]
pub fn encode_connection_complete(status: Status, handle: ConnHandle, bd_addr: BdAddr) -> Vec<u8> {
    let mut buf = event_header(EventCode::ConnectionComplete, 11);
    let mut p = Packer::new(&mut buf);
    p.u8(status.0)
        .u16(handle.into())
        .put(*bd_addr.as_bytes())
        .u8(super::consts::LINK_TYPE_ACL)
        .u8(0); // encryption disabled
    buf
}

/// Encodes `HCI_Disconnection_Complete(status, handle, reason)`.
#[must_use]
pub fn encode_disconnection_complete(handle: ConnHandle, status: Status, reason: u8) -> Vec<u8> {
    let mut buf = event_header(EventCode::DisconnectionComplete, 4);
    let mut p = Packer::new(&mut buf);
    p.u8(status.0).u16(handle.into()).u8(reason);
    buf
}

/// Encodes `HCI_Role_Change(status, bd_addr, new_role)`.
#[must_use]
pub fn encode_role_change(bd_addr: BdAddr, new_role: Role) -> Vec<u8> {
    let mut buf = event_header(EventCode::RoleChange, 8);
    let mut p = Packer::new(&mut buf);
    p.u8(Status::SUCCESS.0).put(*bd_addr.as_bytes()).u8(new_role as u8);
    buf
}
