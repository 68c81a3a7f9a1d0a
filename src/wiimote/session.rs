//! The fake Wiimote session state machine (component D, `§3`, `§4.1`,
//! `§4.2`, `§4.3`, `§4.4`, `§4.5`).

use crate::addr::BdAddr;
use crate::error::{Error, MemoryError, Result};
use crate::hci::{ConnHandle, WIIMOTE_HCI_CLASS};
use crate::hid;
use crate::l2cap::channel::{Channel, ChannelState, ChannelTable};
use crate::l2cap::codec as l2cap_codec;
use crate::l2cap::consts::{connect_result, Psm, SignalCode, NULL_CID, SIGNAL_CID};
use crate::transport::{HciTransport, L2capTransport};

use super::eeprom::Eeprom;
use super::extension::Extension;
use super::regs::ExtensionRegisters;

/// Wire `space` value selecting the EEPROM address space.
pub const SPACE_EEPROM: u8 = 0x00;
/// Wire `space` value selecting the primary I2C bus alias.
pub const SPACE_I2C_BUS: u8 = 0x04;
/// Wire `space` value selecting the secondary I2C bus alias.
pub const SPACE_I2C_BUS_ALT: u8 = 0x05;

/// I2C slave address of the (forbidden-over-I2C) EEPROM.
pub const EEPROM_I2C_ADDR: u8 = 0x50;
/// I2C slave address of the extension register window.
pub const EXTENSION_I2C_ADDR: u8 = 0x52;

/// In-band error code for a `READ_DATA` request received while a previous
/// one is still in flight (`§4.2`, `§7`).
const READ_BUSY_ERROR: u8 = 0x04;

/// Baseband establishment state (`§3`, `§4.1`).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BasebandState {
    /// No connection exists or has been requested.
    #[default]
    Inactive,
    /// `hci_request_connection` has not yet been issued (or accepted by the
    /// transport) for this activation.
    RequestConnection,
    /// The host has accepted the connection; a connection handle is live.
    Complete,
}

/// ACL/channel-linking state (`§3`, `§4.1`).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AclState {
    /// Linking is finished (or has not started).
    #[default]
    Inactive,
    /// The HID channels are being created and configured.
    Linking,
}

/// The address space a resolved memory access targets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum MemoryTarget {
    Eeprom,
    Extension,
}

fn resolve_target(space: u8, slave_addr: u8) -> std::result::Result<MemoryTarget, MemoryError> {
    match space {
        SPACE_EEPROM => Ok(MemoryTarget::Eeprom),
        SPACE_I2C_BUS | SPACE_I2C_BUS_ALT => match slave_addr {
            EXTENSION_I2C_ADDR => Ok(MemoryTarget::Extension),
            EEPROM_I2C_ADDR => Err(MemoryError::InvalidAddress),
            _ => Err(MemoryError::Nack),
        },
        _ => Err(MemoryError::InvalidSpace),
    }
}

/// A pending multi-step `READ_DATA` cursor (`§4.2`).
#[derive(Clone, Copy, Debug)]
struct ReadRequest {
    target: MemoryTarget,
    address: u16,
    remaining: u16,
}

/// Core-provided callbacks a session's owning USB device implements
/// (`§4.6`, `§6`). Default methods are no-ops so tests can pass `&mut ()`
/// where only some callbacks matter.
pub trait SessionCallbacks {
    /// Invoked exactly once, after both HID channels reach `Complete`.
    fn assigned(&mut self) {}
    /// Invoked when the session is torn down while HID-Interrupt was live.
    fn disconnect(&mut self) {}
    /// Invoked on a `LED` output report.
    fn set_leds(&mut self, _leds: u8) {}
}

impl SessionCallbacks for () {}

/// Snapshot of what a torn-down session still owed its collaborators:
/// L2CAP disconnect-reqs for every channel the peer had accepted, and
/// whether an HCI disconnection-complete event is owed (`§3` lifecycle).
#[derive(Clone, Debug, Default)]
pub struct DisconnectOutcome {
    /// Whether the baseband was `Complete` (an HCI event is owed).
    pub baseband_was_complete: bool,
    /// The connection handle that was live, if any.
    pub con_handle: ConnHandle,
    /// `(local_cid, remote_cid)` of every channel the peer had accepted.
    pub accepted_channels: Vec<(u16, u16)>,
}

/// One emulated fake Wiimote (`§3`).
#[derive(Debug)]
pub struct Session {
    active: bool,
    bd_addr: BdAddr,
    baseband: BasebandState,
    acl: AclState,
    con_handle: ConnHandle,
    channels: ChannelTable,
    next_local_cid: u16,
    next_ident: u8,
    assigned_notified: bool,
    reporting_mode: u8,
    reporting_continuous: bool,
    buttons: u16,
    current_extension: Extension,
    pending_extension: Extension,
    extension_regs: ExtensionRegisters,
    input_dirty: bool,
    eeprom: Eeprom,
    read_request: Option<ReadRequest>,
    request_mtu: u16,
    flush_timeout_ms: u16,
}

impl Session {
    /// Creates an inactive session for slot `index` (`bd_addr = f(index)`,
    /// invariant 1).
    #[must_use]
    pub fn new(index: usize, eeprom_size: usize, request_mtu: u16, flush_timeout_ms: u16) -> Self {
        Self {
            active: false,
            bd_addr: BdAddr::for_session(index),
            baseband: BasebandState::Inactive,
            acl: AclState::Inactive,
            con_handle: ConnHandle::invalid(),
            channels: ChannelTable::default(),
            next_local_cid: crate::l2cap::consts::FIRST_LOCAL_CID,
            next_ident: 0,
            assigned_notified: false,
            reporting_mode: hid::input_report::DISABLED,
            reporting_continuous: false,
            buttons: 0,
            current_extension: Extension::None,
            pending_extension: Extension::None,
            extension_regs: ExtensionRegisters::default(),
            input_dirty: false,
            eeprom: Eeprom::new(eeprom_size),
            read_request: None,
            request_mtu,
            flush_timeout_ms,
        }
    }

    /// This session's permanent Bluetooth device address.
    #[must_use]
    pub const fn bd_addr(&self) -> BdAddr {
        self.bd_addr
    }

    /// Whether the session is currently occupying a session-table slot.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// The connection handle assigned when the baseband reached `Complete`.
    #[must_use]
    pub const fn con_handle(&self) -> ConnHandle {
        self.con_handle
    }

    /// Current baseband state.
    #[must_use]
    pub const fn baseband(&self) -> BasebandState {
        self.baseband
    }

    /// Activates the session: `add_input_device` succeeded (`§3`
    /// lifecycle). Baseband begins in `RequestConnection`.
    pub fn activate(&mut self) {
        self.active = true;
        self.baseband = BasebandState::RequestConnection;
    }

    /// Sets the button field read by the reporting path and by extension
    /// drivers that piggyback their own buttons on it.
    pub fn set_buttons(&mut self, buttons: u16) {
        if buttons != self.buttons {
            self.buttons = buttons;
            self.input_dirty = true;
        }
    }

    /// Overwrites the extension's live payload bytes; marks input dirty only
    /// when they differ from what was already there (`fake_wiimote_mgr_report_input_ext`'s
    /// byte-compare, carried over per `SPEC_FULL.md`'s supplemented features).
    pub fn set_extension_payload(&mut self, bytes: &[u8]) {
        if self.extension_regs.controller_data_prefix(bytes.len()) != bytes {
            self.extension_regs.set_controller_data(bytes);
            self.input_dirty = true;
        }
    }

    /// Requests an extension change, materialised on a later tick (`§4.1`
    /// step 2).
    pub fn set_pending_extension(&mut self, ext: Extension) {
        self.pending_extension = ext;
    }

    /// Accepts a host `Accept_Connection_Request` for this session
    /// (`§4.8`): advances baseband to `Complete` and starts ACL linking.
    /// The HCI events themselves are the dispatcher's responsibility.
    pub fn accept(&mut self, con_handle: ConnHandle) {
        self.baseband = BasebandState::Complete;
        self.con_handle = con_handle;
        self.acl = AclState::Linking;
    }

    /// Tears the session down: reports what the caller still owes its
    /// collaborators (L2CAP disconnect-reqs, an HCI event) and fires the
    /// `disconnect` callback if the HID-Interrupt channel was live.
    pub fn begin_disconnect(&mut self, cb: &mut dyn SessionCallbacks) -> DisconnectOutcome {
        if self.channels.hid_interrupt.is_some_and(|ch| ch.is_complete()) {
            cb.disconnect();
        }
        let accepted_channels = self
            .channels
            .iter()
            .filter(|ch| ch.is_accepted())
            .map(|ch| (ch.local_cid(), ch.remote_cid()))
            .collect();
        let outcome = DisconnectOutcome {
            baseband_was_complete: matches!(self.baseband, BasebandState::Complete),
            con_handle: self.con_handle,
            accepted_channels,
        };
        let (index_addr, eeprom_size, request_mtu, flush_timeout_ms) =
            (self.bd_addr, self.eeprom.len(), self.request_mtu, self.flush_timeout_ms);
        *self = Self {
            active: false,
            bd_addr: index_addr,
            baseband: BasebandState::Inactive,
            acl: AclState::Inactive,
            con_handle: ConnHandle::invalid(),
            channels: ChannelTable::default(),
            next_local_cid: crate::l2cap::consts::FIRST_LOCAL_CID,
            next_ident: 0,
            assigned_notified: false,
            reporting_mode: hid::input_report::DISABLED,
            reporting_continuous: false,
            buttons: 0,
            current_extension: Extension::None,
            pending_extension: Extension::None,
            extension_regs: ExtensionRegisters::default(),
            input_dirty: false,
            eeprom: Eeprom::new(eeprom_size),
            read_request: None,
            request_mtu,
            flush_timeout_ms,
        };
        outcome
    }

    fn next_ident(&mut self) -> u8 {
        let ident = self.next_ident;
        self.next_ident = self.next_ident.wrapping_add(1);
        ident
    }

    fn alloc_local_cid(&mut self) -> u16 {
        let cid = self.next_local_cid;
        self.next_local_cid += 1;
        cid
    }

    fn send_hid_interrupt(&self, l2cap: &mut dyn L2capTransport, frame: Vec<u8>) -> Result<()> {
        let remote_cid = self
            .channels
            .hid_interrupt
            .map_or(NULL_CID, |ch| ch.remote_cid());
        l2cap.send(self.con_handle, l2cap_codec::encode_data(remote_cid, &frame))
    }

    fn send_signal(&self, l2cap: &mut dyn L2capTransport, cmd: Vec<u8>) -> Result<()> {
        l2cap.send(self.con_handle, l2cap_codec::encode_data(SIGNAL_CID, &cmd))
    }

    /// Advances the session by one tick: baseband connection request, then
    /// the channel linking cascade, then (on a tick where linking was
    /// already done before this tick started) read-request /
    /// extension-change / data-report processing (`§4.1`). The linking
    /// cascade opens at most one new channel per tick, but sends a
    /// `CONFIG_REQ` for *every* newly accepted channel still pending
    /// configuration in the same tick — mirroring
    /// `check_send_config_for_new_channel` being called unconditionally for
    /// both HID channels every tick in the original manager, so a single
    /// tick can carry a connect-req and up to two config-reqs at once.
    pub fn tick(
        &mut self,
        hci: &mut dyn HciTransport,
        l2cap: &mut dyn L2capTransport,
        cb: &mut dyn SessionCallbacks,
    ) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        if self.baseband == BasebandState::RequestConnection {
            if hci.request_connection(self.bd_addr, WIIMOTE_HCI_CLASS, crate::hci::LINK_TYPE_ACL) {
                self.baseband = BasebandState::Inactive;
            }
            return Ok(());
        }
        if self.baseband != BasebandState::Complete {
            return Ok(());
        }
        let acl_was_inactive = self.acl == AclState::Inactive;
        if self.acl == AclState::Linking {
            if self.channels.hid_control.is_none() {
                self.open_channel(Psm::HidControl, l2cap)?;
            } else if self.channels.hid_interrupt.is_none() {
                self.open_channel(Psm::HidInterrupt, l2cap)?;
            } else {
                let both_complete = self.channels.hid_control.is_some_and(|ch| ch.is_complete())
                    && self.channels.hid_interrupt.is_some_and(|ch| ch.is_complete());
                if both_complete {
                    self.acl = AclState::Inactive;
                    if !self.assigned_notified {
                        cb.assigned();
                        self.assigned_notified = true;
                    }
                }
            }
            self.send_config_for_new_channel(Psm::HidControl, l2cap)?;
            self.send_config_for_new_channel(Psm::HidInterrupt, l2cap)?;
        }
        if acl_was_inactive {
            self.post_link_tick(l2cap)?;
        }
        Ok(())
    }

    fn open_channel(&mut self, psm: Psm, l2cap: &mut dyn L2capTransport) -> Result<()> {
        let local_cid = self.alloc_local_cid();
        let ident = self.next_ident();
        let pkt = l2cap_codec::encode_connect_req(ident, psm as u16, local_cid);
        self.send_signal(l2cap, pkt)?;
        let ch = Channel::new(psm, local_cid);
        match psm {
            Psm::HidControl => self.channels.hid_control = Some(ch),
            Psm::HidInterrupt => self.channels.hid_interrupt = Some(ch),
            Psm::Sdp => self.channels.sdp = Some(ch),
        }
        Ok(())
    }

    /// `check_send_config_for_new_channel`: if `psm`'s channel is accepted
    /// and still `Inactive`, sends its `CONFIG_REQ` and marks it pending.
    /// A no-op for a channel that isn't open yet, isn't accepted, or is
    /// already past this point — so calling this for both HID channels
    /// every tick only ever sends a config-req for a channel that just
    /// became eligible.
    fn send_config_for_new_channel(&mut self, psm: Psm, l2cap: &mut dyn L2capTransport) -> Result<()> {
        let remote_cid = {
            let slot = match psm {
                Psm::HidControl => &mut self.channels.hid_control,
                Psm::HidInterrupt => &mut self.channels.hid_interrupt,
                Psm::Sdp => return Ok(()),
            };
            let Some(ch) = slot else { return Ok(()) };
            if !(ch.is_accepted() && matches!(ch.state(), ChannelState::Inactive)) {
                return Ok(());
            }
            ch.mark_config_pending();
            ch.remote_cid()
        };
        send_config_req(self, remote_cid, l2cap)
    }

    fn perform_read_step(&mut self, l2cap: &mut dyn L2capTransport) -> Result<bool> {
        let Some(mut req) = self.read_request.take() else {
            return Ok(false);
        };
        if req.remaining == 0 {
            return Ok(false);
        }
        let step = req.remaining.min(16);
        let address = req.address;
        let mut data = [0_u8; 16];
        let outcome = match req.target {
            MemoryTarget::Eeprom => {
                self.eeprom
                    .read_data(&mut data[..usize::from(step)], u32::from(address), step)
            }
            MemoryTarget::Extension => self
                .extension_regs
                .read_data(&mut data[..usize::from(step)], address, step),
        };
        #[allow(clippy::cast_possible_truncation)]
        let (size_minus_one, error_code) = match outcome {
            Ok(()) => {
                req.address = address.wrapping_add(step);
                req.remaining -= step;
                ((step - 1) as u8, 0_u8)
            }
            Err(Error::MemorySpace(me)) => {
                req.remaining = 0;
                (15, me.wire_code())
            }
            Err(_) => {
                req.remaining = 0;
                (15, MemoryError::InvalidSpace.wire_code())
            }
        };
        if req.remaining > 0 {
            self.read_request = Some(req);
        }
        let body = hid::read_data_reply_body(self.buttons, address, size_minus_one, error_code, &data);
        let frame = hid::frame_input_report(hid::input_report::READ_DATA_REPLY, &body);
        self.send_hid_interrupt(l2cap, frame)?;
        Ok(true)
    }

    fn materialise_extension_change(&mut self) {
        match self.pending_extension.id_code() {
            Some(id) => self.extension_regs.set_identifier(id),
            None => self.extension_regs.set_identifier([0; 6]),
        }
        self.current_extension = self.pending_extension;
        self.reporting_mode = hid::input_report::DISABLED;
    }

    fn post_link_tick(&mut self, l2cap: &mut dyn L2capTransport) -> Result<()> {
        if self.perform_read_step(l2cap)? {
            return Ok(());
        }
        if self.pending_extension != self.current_extension {
            self.materialise_extension_change();
            let body =
                hid::status_report_body(self.buttons, self.current_extension != Extension::None);
            let frame = hid::frame_input_report(hid::input_report::STATUS, &body);
            return self.send_hid_interrupt(l2cap, frame);
        }
        self.send_data_report(l2cap)
    }

    fn send_data_report(&mut self, l2cap: &mut dyn L2capTransport) -> Result<()> {
        if self.reporting_mode == hid::input_report::DISABLED {
            return Ok(());
        }
        if !(self.reporting_continuous || self.input_dirty) {
            return Ok(());
        }
        let mut body = Vec::new();
        if hid::has_btn(self.reporting_mode) {
            body.extend_from_slice(&self.buttons.to_le_bytes());
        }
        let ext_size = hid::ext_size(self.reporting_mode);
        if ext_size > 0 {
            let mut ext = vec![0_u8; usize::from(ext_size)];
            self.extension_regs.read_data(&mut ext, 0, u16::from(ext_size))?;
            body.extend_from_slice(&ext);
        }
        let frame = hid::frame_input_report(self.reporting_mode, &body);
        self.send_hid_interrupt(l2cap, frame)?;
        self.input_dirty = false;
        Ok(())
    }

    /// Dispatches one HID output report (`§4.4`).
    pub fn handle_output_report(
        &mut self,
        data: &[u8],
        l2cap: &mut dyn L2capTransport,
        cb: &mut dyn SessionCallbacks,
    ) -> Result<()> {
        let Some((&id, payload)) = data.split_first() else {
            return Ok(());
        };
        match id {
            hid::output_report::LED => self.handle_led(payload, l2cap, cb),
            hid::output_report::STATUS => self.handle_status_request(l2cap),
            hid::output_report::REPORT_MODE => self.handle_report_mode(payload, l2cap),
            hid::output_report::WRITE_DATA => self.handle_write_data(payload, l2cap),
            hid::output_report::READ_DATA => self.handle_read_data(payload, l2cap),
            _ => Ok(()),
        }
    }

    fn handle_led(
        &mut self,
        payload: &[u8],
        l2cap: &mut dyn L2capTransport,
        cb: &mut dyn SessionCallbacks,
    ) -> Result<()> {
        let Some(&byte) = payload.first() else {
            return Ok(());
        };
        cb.set_leds(byte & 0xF0);
        if byte & 0x01 != 0 {
            let body = hid::ack_report_body(self.buttons, hid::output_report::LED, 0);
            let frame = hid::frame_input_report(hid::input_report::ACK, &body);
            return self.send_hid_interrupt(l2cap, frame);
        }
        Ok(())
    }

    fn handle_status_request(&mut self, l2cap: &mut dyn L2capTransport) -> Result<()> {
        let body = hid::status_report_body(self.buttons, self.current_extension != Extension::None);
        let frame = hid::frame_input_report(hid::input_report::STATUS, &body);
        self.send_hid_interrupt(l2cap, frame)
    }

    fn handle_report_mode(&mut self, payload: &[u8], l2cap: &mut dyn L2capTransport) -> Result<()> {
        if payload.len() < 2 {
            return Ok(());
        }
        let flags = payload[0];
        self.reporting_continuous = flags & 0x02 != 0;
        self.reporting_mode = payload[1];
        if flags & 0x04 != 0 {
            let body = hid::ack_report_body(self.buttons, hid::output_report::REPORT_MODE, 0);
            let frame = hid::frame_input_report(hid::input_report::ACK, &body);
            return self.send_hid_interrupt(l2cap, frame);
        }
        Ok(())
    }

    fn handle_write_data(&mut self, payload: &[u8], l2cap: &mut dyn L2capTransport) -> Result<()> {
        if payload.len() < 21 {
            return Ok(());
        }
        let space = payload[0];
        let slave_addr = payload[1];
        let address = u16::from_be_bytes([payload[2], payload[3]]);
        let size = payload[4];
        if size == 0 || size > 16 {
            return Ok(());
        }
        let data = &payload[5..5 + usize::from(size)];
        let error = match resolve_target(space, slave_addr) {
            Ok(MemoryTarget::Eeprom) => {
                match self.eeprom.write_data(data, u32::from(address), u16::from(size)) {
                    Ok(()) => 0,
                    Err(Error::MemorySpace(me)) => me.wire_code(),
                    Err(_) => MemoryError::InvalidSpace.wire_code(),
                }
            }
            Ok(MemoryTarget::Extension) => {
                match self.extension_regs.write_data(data, address, u16::from(size)) {
                    Ok(()) => 0,
                    Err(Error::MemorySpace(me)) => me.wire_code(),
                    Err(_) => MemoryError::InvalidSpace.wire_code(),
                }
            }
            Err(me) => me.wire_code(),
        };
        let body = hid::ack_report_body(self.buttons, hid::output_report::WRITE_DATA, error);
        let frame = hid::frame_input_report(hid::input_report::ACK, &body);
        self.send_hid_interrupt(l2cap, frame)
    }

    fn handle_read_data(&mut self, payload: &[u8], l2cap: &mut dyn L2capTransport) -> Result<()> {
        if payload.len() < 6 {
            return Ok(());
        }
        let space = payload[0];
        let slave_addr = payload[1];
        let address = u16::from_be_bytes([payload[2], payload[3]]);
        let size = u16::from_be_bytes([payload[4], payload[5]]);
        if size == 0 {
            return Ok(());
        }
        if self.read_request.is_some_and(|r| r.remaining > 0) {
            let body = hid::ack_report_body(self.buttons, hid::output_report::READ_DATA, READ_BUSY_ERROR);
            let frame = hid::frame_input_report(hid::input_report::ACK, &body);
            return self.send_hid_interrupt(l2cap, frame);
        }
        match resolve_target(space, slave_addr) {
            Ok(target) => {
                self.read_request = Some(ReadRequest {
                    target,
                    address,
                    remaining: size,
                });
                self.perform_read_step(l2cap).map(|_| ())
            }
            Err(me) => {
                let data = [0_u8; 16];
                let body = hid::read_data_reply_body(self.buttons, address, 15, me.wire_code(), &data);
                let frame = hid::frame_input_report(hid::input_report::READ_DATA_REPLY, &body);
                self.send_hid_interrupt(l2cap, frame)
            }
        }
    }

    /// Handles one inbound L2CAP signalling-channel payload (`§4.5`).
    /// Returns `Err(Error::ProtocolFatal(_))` when the session must be torn
    /// down (the caller is expected to call [`Session::begin_disconnect`]).
    pub fn handle_l2cap_signal(
        &mut self,
        payload: &[u8],
        l2cap: &mut dyn L2capTransport,
        cb: &mut dyn SessionCallbacks,
    ) -> Result<()> {
        for cmd in l2cap_codec::decode_signal_commands(payload)? {
            let Some(code) = SignalCode::from_u8(cmd.code) else {
                continue;
            };
            match code {
                SignalCode::ConnectReq => self.on_connect_req(cmd.ident, cmd.payload, l2cap)?,
                SignalCode::ConnectRsp => self.on_connect_rsp(cmd.payload)?,
                SignalCode::ConfigReq => self.on_config_req(cmd.ident, cmd.payload, l2cap)?,
                SignalCode::ConfigRsp => self.on_config_rsp(cmd.payload)?,
                SignalCode::DisconnectReq => {
                    self.on_disconnect_req(cmd.ident, cmd.payload, l2cap, cb)?;
                }
                SignalCode::CommandReject | SignalCode::DisconnectRsp => {}
            }
        }
        Ok(())
    }

    /// `§9` Open Question (a): a host-initiated `CONNECT_REQ` is accepted
    /// by standing up an SDP channel entry and replying with success.
    fn on_connect_req(&mut self, ident: u8, payload: &[u8], l2cap: &mut dyn L2capTransport) -> Result<()> {
        let req = l2cap_codec::decode_connect_req(payload)?;
        if Psm::from_u16(req.psm) != Some(Psm::Sdp) {
            return Ok(());
        }
        let local_cid = self.alloc_local_cid();
        let mut ch = Channel::new(Psm::Sdp, local_cid);
        ch.set_remote_cid(req.scid);
        self.channels.sdp = Some(ch);
        let rsp = l2cap_codec::encode_connect_rsp_success(ident, local_cid, req.scid);
        self.send_signal(l2cap, rsp)
    }

    fn on_connect_rsp(&mut self, payload: &[u8]) -> Result<()> {
        let rsp = l2cap_codec::decode_connect_rsp(payload)?;
        let Some(ch) = self.channels.by_local_cid(rsp.scid) else {
            return Ok(());
        };
        let libogc_psm_not_supported =
            rsp.dcid == connect_result::PSM_NOT_SUPPORTED && rsp.scid == 0;
        if rsp.result != connect_result::SUCCESS || libogc_psm_not_supported {
            return Err(Error::ProtocolFatal("l2cap connect rsp failure"));
        }
        ch.set_remote_cid(rsp.dcid);
        Ok(())
    }

    fn on_config_req(&mut self, ident: u8, payload: &[u8], l2cap: &mut dyn L2capTransport) -> Result<()> {
        let (dcid, opts) = l2cap_codec::decode_config_req(payload)?;
        let Some(ch) = self.channels.by_local_cid(dcid) else {
            return Ok(());
        };
        for opt in &opts {
            if let l2cap_codec::ConfigOption::Mtu(mtu) = *opt {
                ch.begin_config(mtu);
            }
        }
        let remote_cid = ch.remote_cid();
        let options = l2cap_codec::encode_options(&opts);
        let rsp = l2cap_codec::encode_config_rsp(ident, remote_cid, &options);
        self.send_signal(l2cap, rsp)
    }

    fn on_config_rsp(&mut self, payload: &[u8]) -> Result<()> {
        let rsp = l2cap_codec::decode_config_rsp(payload)?;
        let Some(ch) = self.channels.by_local_cid(rsp.scid) else {
            return Ok(());
        };
        if rsp.result == connect_result::SUCCESS {
            ch.complete();
        }
        Ok(())
    }

    fn on_disconnect_req(
        &mut self,
        ident: u8,
        payload: &[u8],
        l2cap: &mut dyn L2capTransport,
        cb: &mut dyn SessionCallbacks,
    ) -> Result<()> {
        let req = l2cap_codec::decode_disconnect_req(payload)?;
        let was_complete_interrupt = self
            .channels
            .hid_interrupt
            .is_some_and(|ch| ch.local_cid() == req.dcid && ch.is_complete());
        if was_complete_interrupt {
            cb.disconnect();
        }
        self.channels.remove_by_local_cid(req.dcid);
        let rsp = l2cap_codec::encode_disconnect_rsp(ident, req.dcid, req.scid);
        self.send_signal(l2cap, rsp)
    }
}

/// Encodes and sends a `CONFIG_REQ` for an already-accepted channel.
fn send_config_req(session: &mut Session, remote_cid: u16, l2cap: &mut dyn L2capTransport) -> Result<()> {
    let ident = session.next_ident();
    let pkt = l2cap_codec::encode_config_req(
        ident,
        remote_cid,
        session.request_mtu,
        session.flush_timeout_ms,
    );
    session.send_signal(l2cap, pkt)
}
