//! L2CAP header and signalling command wire codec (`§4.5`, `§6`).

use structbuf::{Packer, Unpacker};

use crate::error::{Error, Result};

use super::consts::{config_opt, CMD_HDR, L2CAP_HDR};

/// One decoded signalling command, still carrying its undecoded payload
/// (the caller further decodes based on `code`).
#[derive(Clone, Copy, Debug)]
pub struct SignalCommand<'a> {
    pub code: u8,
    pub ident: u8,
    pub payload: &'a [u8],
}

/// Iterates the length-framed signalling commands in an inbound L2CAP
/// signalling-channel payload (`§4.5`: "the handler iterates commands until
/// the buffer is exhausted").
pub fn decode_signal_commands(mut data: &[u8]) -> Result<Vec<SignalCommand<'_>>> {
    let mut cmds = Vec::new();
    while data.len() >= CMD_HDR {
        let mut hdr = Unpacker::new(data);
        let code = hdr.u8();
        let ident = hdr.u8();
        let len = usize::from(hdr.u16());
        if data.len() < CMD_HDR + len {
            return Err(Error::Malformed {
                context: "l2cap signal command length",
            });
        }
        cmds.push(SignalCommand {
            code,
            ident,
            payload: &data[CMD_HDR..CMD_HDR + len],
        });
        data = &data[CMD_HDR + len..];
    }
    Ok(cmds)
}

/// Wraps an L2CAP payload with its 4-byte header (`length`, `dcid`).
#[must_use]
pub fn encode_data(dcid: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(L2CAP_HDR + payload.len());
    let mut p = Packer::new(&mut buf);
    #[allow(clippy::cast_possible_truncation)]
    p.u16(payload.len() as u16).u16(dcid).put(payload);
    buf
}

fn signal_cmd(code: u8, ident: u8, payload_len: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(CMD_HDR + payload_len);
    let mut p = Packer::new(&mut buf);
    #[allow(clippy::cast_possible_truncation)]
    p.u8(code).u8(ident).u16(payload_len as u16);
    buf
}

/// Encodes `L2CAP_ConnectionRequest(psm, scid)`.
#[must_use]
pub fn encode_connect_req(ident: u8, psm: u16, scid: u16) -> Vec<u8> {
    let mut buf = signal_cmd(super::consts::SignalCode::ConnectReq as u8, ident, 4);
    let mut p = Packer::new(&mut buf);
    p.u16(psm).u16(scid);
    buf
}

/// Encodes `L2CAP_ConfigurationRequest(dcid, flags=0, MTU option)`.
#[must_use]
pub fn encode_config_req(ident: u8, dcid: u16, mtu: u16, flush_timeout_ms: u16) -> Vec<u8> {
    let mut buf = signal_cmd(
        super::consts::SignalCode::ConfigReq as u8,
        ident,
        4 + 4 + 4,
    );
    let mut p = Packer::new(&mut buf);
    p.u16(dcid)
        .u16(0) // flags
        .u8(config_opt::MTU)
        .u8(2)
        .u16(mtu)
        .u8(config_opt::FLUSH_TIMO)
        .u8(2)
        .u16(flush_timeout_ms);
    buf
}

/// Encodes `L2CAP_ConfigurationResponse(scid, SUCCESS, echoed options)`.
#[must_use]
pub fn encode_config_rsp(ident: u8, scid: u16, options: &[u8]) -> Vec<u8> {
    let mut buf = signal_cmd(
        super::consts::SignalCode::ConfigRsp as u8,
        ident,
        6 + options.len(),
    );
    let mut p = Packer::new(&mut buf);
    p.u16(scid).u16(0).u16(0).put(options); // flags, result=SUCCESS
    buf
}

/// Encodes `L2CAP_DisconnectionRequest(dcid, scid)`.
#[must_use]
pub fn encode_disconnect_req(ident: u8, dcid: u16, scid: u16) -> Vec<u8> {
    let mut buf = signal_cmd(super::consts::SignalCode::DisconnectReq as u8, ident, 4);
    let mut p = Packer::new(&mut buf);
    p.u16(dcid).u16(scid);
    buf
}

/// Encodes `L2CAP_DisconnectionResponse(dcid, scid)`.
#[must_use]
pub fn encode_disconnect_rsp(ident: u8, dcid: u16, scid: u16) -> Vec<u8> {
    let mut buf = signal_cmd(super::consts::SignalCode::DisconnectRsp as u8, ident, 4);
    let mut p = Packer::new(&mut buf);
    p.u16(dcid).u16(scid);
    buf
}

/// Encodes `L2CAP_ConnectionResponse(dcid, scid, SUCCESS, NO_INFO)`, used
/// when this core accepts a host-initiated `CONNECT_REQ` (`§9` Open
/// Question (a)).
#[must_use]
pub fn encode_connect_rsp_success(ident: u8, dcid: u16, scid: u16) -> Vec<u8> {
    let mut buf = signal_cmd(super::consts::SignalCode::ConnectRsp as u8, ident, 8);
    let mut p = Packer::new(&mut buf);
    p.u16(dcid).u16(scid).u16(0).u16(0); // result=SUCCESS, status=NO_INFO
    buf
}

/// Decoded `CONNECT_REQ(psm, scid)` body, for a host-initiated request.
#[derive(Clone, Copy, Debug)]
pub struct ConnectReq {
    pub psm: u16,
    pub scid: u16,
}

/// Decodes a `CONNECT_REQ` body.
pub fn decode_connect_req(payload: &[u8]) -> Result<ConnectReq> {
    if payload.len() < 4 {
        return Err(Error::Malformed {
            context: "l2cap connect req",
        });
    }
    let mut p = Unpacker::new(payload);
    Ok(ConnectReq {
        psm: p.u16(),
        scid: p.u16(),
    })
}

/// Decoded `CONNECT_RSP(dcid, scid, result, status)` body.
#[derive(Clone, Copy, Debug)]
pub struct ConnectRsp {
    pub dcid: u16,
    pub scid: u16,
    pub result: u16,
    pub status: u16,
}

/// Decodes a `CONNECT_RSP` body.
pub fn decode_connect_rsp(payload: &[u8]) -> Result<ConnectRsp> {
    if payload.len() < 8 {
        return Err(Error::Malformed {
            context: "l2cap connect rsp",
        });
    }
    let mut p = Unpacker::new(payload);
    Ok(ConnectRsp {
        dcid: p.u16(),
        scid: p.u16(),
        result: p.u16(),
        status: p.u16(),
    })
}

/// Decoded `CONFIG_RSP(scid, flags, result)` body (options ignored: this
/// core always sends its own MTU and expects unconditional success).
#[derive(Clone, Copy, Debug)]
pub struct ConfigRsp {
    pub scid: u16,
    pub result: u16,
}

/// Decodes a `CONFIG_RSP` body.
pub fn decode_config_rsp(payload: &[u8]) -> Result<ConfigRsp> {
    if payload.len() < 6 {
        return Err(Error::Malformed {
            context: "l2cap config rsp",
        });
    }
    let mut p = Unpacker::new(payload);
    Ok(ConfigRsp {
        scid: p.u16(),
        result: {
            let _flags = p.u16();
            p.u16()
        },
    })
}

/// Decoded `DISCONNECT_REQ(dcid, scid)` body.
#[derive(Clone, Copy, Debug)]
pub struct DisconnectReq {
    pub dcid: u16,
    pub scid: u16,
}

/// Decodes a `DISCONNECT_REQ` body.
pub fn decode_disconnect_req(payload: &[u8]) -> Result<DisconnectReq> {
    if payload.len() < 4 {
        return Err(Error::Malformed {
            context: "l2cap disconnect req",
        });
    }
    let mut p = Unpacker::new(payload);
    Ok(DisconnectReq {
        dcid: p.u16(),
        scid: p.u16(),
    })
}

/// A decoded `CONFIG_REQ` option, either recognised (`Mtu`/`FlushTimeout`) or
/// opaque (echoed back verbatim per `§4.5`).
#[derive(Clone, Copy, Debug)]
pub enum ConfigOption<'a> {
    Mtu(u16),
    FlushTimeout(u16),
    Unknown { raw: &'a [u8] },
}

/// Decodes the `(dcid, flags, options…)` body of a `CONFIG_REQ`, returning
/// the destination CID and the option list. Unknown options carry their
/// entire TLV (type + length + value) in `raw` so they can be echoed back
/// unmodified.
pub fn decode_config_req(payload: &[u8]) -> Result<(u16, Vec<ConfigOption<'_>>)> {
    if payload.len() < 4 {
        return Err(Error::Malformed {
            context: "l2cap config req header",
        });
    }
    let mut hdr = Unpacker::new(payload);
    let dcid = hdr.u16();
    let _flags = hdr.u16();
    let mut opts = Vec::new();
    let mut off = 4;
    while off + 2 <= payload.len() {
        let ty = payload[off];
        let len = usize::from(payload[off + 1]);
        let val_start = off + 2;
        let val_end = val_start + len;
        if val_end > payload.len() {
            return Err(Error::Malformed {
                context: "l2cap config option length",
            });
        }
        let val = &payload[val_start..val_end];
        opts.push(match ty {
            config_opt::MTU if len == 2 => {
                ConfigOption::Mtu(u16::from_le_bytes([val[0], val[1]]))
            }
            config_opt::FLUSH_TIMO if len == 2 => {
                ConfigOption::FlushTimeout(u16::from_le_bytes([val[0], val[1]]))
            }
            _ => ConfigOption::Unknown {
                raw: &payload[off..val_end],
            },
        });
        off = val_end;
    }
    Ok((dcid, opts))
}

/// Re-encodes an option list for echoing unknown options back verbatim in
/// a `CONFIG_RSP`.
#[must_use]
pub fn encode_options(opts: &[ConfigOption<'_>]) -> Vec<u8> {
    let mut buf = Vec::new();
    for opt in opts {
        match *opt {
            ConfigOption::Mtu(mtu) => {
                buf.push(config_opt::MTU);
                buf.push(2);
                buf.extend_from_slice(&mtu.to_le_bytes());
            }
            ConfigOption::FlushTimeout(t) => {
                buf.push(config_opt::FLUSH_TIMO);
                buf.push(2);
                buf.extend_from_slice(&t.to_le_bytes());
            }
            ConfigOption::Unknown { raw } => buf.extend_from_slice(raw),
        }
    }
    buf
}
