//! Session table, tick driver, and HCI inbound dispatch (components E and
//! F, `§3` lifecycle, `§4.8`, `§5`).

use tracing::{debug, trace, warn};

use crate::addr::BdAddr;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::hci::{self, ConnHandle, HciCommand};
use crate::transport::{HciTransport, L2capTransport};
use crate::usb::{self, Device, Driver};
use crate::wiimote::{Session, SessionCallbacks};

/// An index into the manager's fixed-capacity session table, returned by
/// [`Manager::add_input_device`] and used to address a session afterwards.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SessionId(usize);

/// Bridges a session's lifecycle callbacks onto its owning device's
/// driver, so [`Session`] never needs to know about USB at all.
struct DriverCallbacks<'a>(&'a mut dyn Driver);

impl SessionCallbacks for DriverCallbacks<'_> {
    fn assigned(&mut self) {
        self.0.assigned();
    }

    fn disconnect(&mut self) {
        if let Err(e) = self.0.disconnect() {
            warn!(error = %e, "driver disconnect callback failed");
        }
    }

    fn set_leds(&mut self, leds: u8) {
        self.0.set_leds(leds);
    }
}

/// Owns every fake Wiimote session and the USB device that feeds it
/// (`§3`, `§5`). `MAX_FAKE_WIIMOTES` is [`Config::max_sessions`].
#[derive(Debug)]
pub struct Manager {
    sessions: Vec<Session>,
    devices: Vec<Option<Device>>,
}

impl Manager {
    /// Builds a manager with `config.max_sessions` inactive session slots.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let sessions = (0..config.max_sessions)
            .map(|i| Session::new(i, config.eeprom_free_size, config.request_mtu, config.flush_timeout_ms))
            .collect();
        let devices = (0..config.max_sessions).map(|_| None).collect();
        Self { sessions, devices }
    }

    /// Registers a newly inserted USB gamepad: resolves a driver for
    /// `(vid, pid)`, claims a free session slot, and activates it
    /// (`add_input_device`, `§3` lifecycle).
    pub fn add_input_device(&mut self, vid: u16, pid: u16) -> Result<SessionId> {
        let idx = self
            .sessions
            .iter()
            .position(|s| !s.is_active())
            .ok_or(Error::NoFreeSession)?;
        let mut driver = usb::make_driver(vid, pid)?;
        driver.init(&mut self.sessions[idx])?;
        self.sessions[idx].activate();
        self.devices[idx] = Some(Device { vid, pid, driver });
        debug!(vid, pid, slot = idx, "usb gamepad attached");
        Ok(SessionId(idx))
    }

    /// Removes a USB gamepad: tears down its session (`§3`: "disconnect").
    pub fn remove_input_device(
        &mut self,
        id: SessionId,
        hci: &mut dyn HciTransport,
        l2cap: &mut dyn L2capTransport,
    ) {
        self.teardown(id.0, hci, l2cap);
        self.devices[id.0] = None;
    }

    /// Delivers one interrupt-in completion to the owning driver.
    pub fn handle_usb_report(&mut self, id: SessionId, report: &[u8]) -> Result<()> {
        if let Some(device) = &mut self.devices[id.0] {
            device.driver.async_response(&mut self.sessions[id.0], report)?;
        }
        Ok(())
    }

    /// Updates a device's visible slot indicator.
    pub fn notify_slot_changed(&mut self, id: SessionId, slot: usize) -> Result<()> {
        if let Some(device) = &mut self.devices[id.0] {
            device.driver.slot_changed(slot)?;
        }
        Ok(())
    }

    /// Delivers one inbound HID output report to the session owning
    /// `handle` (`§4.4`).
    pub fn handle_output_report(
        &mut self,
        handle: ConnHandle,
        data: &[u8],
        l2cap: &mut dyn L2capTransport,
    ) -> Result<()> {
        let Some(idx) = self.index_for_handle(handle) else {
            return Ok(());
        };
        let mut cb = self.callbacks_for(idx);
        self.sessions[idx].handle_output_report(data, l2cap, &mut cb)
    }

    /// Delivers one inbound L2CAP signalling payload to the session owning
    /// `handle` (`§4.5`). Tears the session down on protocol-fatal errors.
    pub fn handle_l2cap_signal(
        &mut self,
        handle: ConnHandle,
        payload: &[u8],
        hci: &mut dyn HciTransport,
        l2cap: &mut dyn L2capTransport,
    ) -> Result<()> {
        let Some(idx) = self.index_for_handle(handle) else {
            return Ok(());
        };
        let outcome = {
            let mut cb = self.callbacks_for(idx);
            self.sessions[idx].handle_l2cap_signal(payload, l2cap, &mut cb)
        };
        if let Err(Error::ProtocolFatal(reason)) = outcome {
            warn!(reason, "l2cap signalling failure, tearing down session");
            self.teardown(idx, hci, l2cap);
        }
        Ok(())
    }

    /// Dispatches one inbound HCI command against the session table
    /// (`§4.8`, component F).
    pub fn handle_hci_command(
        &mut self,
        pkt: &[u8],
        hci: &mut dyn HciTransport,
        l2cap: &mut dyn L2capTransport,
    ) -> Result<()> {
        match hci::decode_command(pkt)? {
            HciCommand::AcceptConnectionRequest { bd_addr, role } => {
                self.accept_connection_request(bd_addr, role, hci);
            }
            HciCommand::RejectConnectionRequest { bd_addr, .. } => {
                if let Some(idx) = self.index_for_bd_addr(bd_addr) {
                    self.teardown(idx, hci, l2cap);
                }
            }
            HciCommand::Disconnect { handle, .. } => {
                if let Some(idx) = self.index_for_handle(handle) {
                    self.teardown(idx, hci, l2cap);
                }
            }
            HciCommand::Unknown => {}
        }
        Ok(())
    }

    /// Returns the session, if any, owning `handle`; used by the HCI layer
    /// to route outbound ACL traffic (`handle_belongs_to_session`, `§4.8`).
    #[must_use]
    pub fn handle_belongs_to_session(&self, handle: ConnHandle) -> Option<SessionId> {
        self.index_for_handle(handle).map(SessionId)
    }

    /// Advances every active session by one tick (`§4.1`, `§5`).
    pub fn tick(&mut self, hci: &mut dyn HciTransport, l2cap: &mut dyn L2capTransport) {
        for idx in 0..self.sessions.len() {
            if !self.sessions[idx].is_active() {
                continue;
            }
            let result = {
                let mut cb = self.callbacks_for(idx);
                self.sessions[idx].tick(hci, l2cap, &mut cb)
            };
            match result {
                Ok(()) => {}
                Err(Error::Busy) => trace!(slot = idx, "transport busy, retrying next tick"),
                Err(Error::ProtocolFatal(reason)) => {
                    warn!(slot = idx, reason, "tick failed fatally, tearing down session");
                    self.teardown(idx, hci, l2cap);
                }
                Err(e) => warn!(slot = idx, error = %e, "tick error"),
            }
        }
    }

    fn callbacks_for(&mut self, idx: usize) -> CallbacksHandle<'_> {
        CallbacksHandle {
            devices: &mut self.devices,
            idx,
        }
    }

    fn index_for_bd_addr(&self, bd_addr: BdAddr) -> Option<usize> {
        self.sessions.iter().position(|s| s.bd_addr() == bd_addr)
    }

    fn index_for_handle(&self, handle: ConnHandle) -> Option<usize> {
        self.sessions
            .iter()
            .position(|s| s.is_active() && s.con_handle() == handle)
    }

    fn accept_connection_request(&mut self, bd_addr: BdAddr, role: hci::Role, hci_tx: &mut dyn HciTransport) {
        let Some(idx) = self.index_for_bd_addr(bd_addr) else {
            return;
        };
        if matches!(self.sessions[idx].baseband(), crate::wiimote::BasebandState::Complete) {
            return;
        }
        let handle = hci_tx.alloc_con_handle();
        let send = |hci_tx: &mut dyn HciTransport, event: Vec<u8>| {
            if let Err(e) = hci_tx.enqueue_event(event) {
                warn!(error = %e, "failed to enqueue hci event");
            }
        };
        send(hci_tx, hci::encode_command_status(hci::Opcode::AcceptConnectionRequest));
        if role == hci::Role::Master {
            send(hci_tx, hci::encode_role_change(bd_addr, role));
        }
        send(hci_tx, hci::encode_connection_complete(hci::Status::SUCCESS, handle, bd_addr));
        self.sessions[idx].accept(handle);
        debug!(slot = idx, ?bd_addr, "accepted connection request");
    }

    fn teardown(&mut self, idx: usize, hci: &mut dyn HciTransport, l2cap: &mut dyn L2capTransport) {
        let outcome = {
            let mut cb = self.callbacks_for(idx);
            self.sessions[idx].begin_disconnect(&mut cb)
        };
        for (local_cid, remote_cid) in outcome.accepted_channels {
            let ident = 0;
            let pkt = crate::l2cap::codec::encode_disconnect_req(ident, remote_cid, local_cid);
            let frame = crate::l2cap::codec::encode_data(crate::l2cap::SIGNAL_CID, &pkt);
            if let Err(e) = l2cap.send(outcome.con_handle, frame) {
                warn!(error = %e, "failed to send l2cap disconnect req during teardown");
            }
        }
        if outcome.baseband_was_complete {
            let event = hci::encode_disconnection_complete(
                outcome.con_handle,
                hci::Status::SUCCESS,
                hci::REASON_USER_ENDED_CONNECTION,
            );
            if let Err(e) = hci.enqueue_event(event) {
                warn!(error = %e, "failed to enqueue disconnection complete");
            }
        }
        debug!(slot = idx, "session torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeHci {
        events: Vec<Vec<u8>>,
    }

    impl HciTransport for FakeHci {
        fn request_connection(&mut self, _bd_addr: BdAddr, _class: [u8; 3], _link_type: u8) -> bool {
            true
        }
        fn enqueue_event(&mut self, event: Vec<u8>) -> Result<()> {
            self.events.push(event);
            Ok(())
        }
        fn alloc_con_handle(&mut self) -> ConnHandle {
            ConnHandle::new(1)
        }
    }

    #[derive(Default)]
    struct FakeL2cap {
        sent: Vec<(ConnHandle, Vec<u8>)>,
    }

    impl L2capTransport for FakeL2cap {
        fn send(&mut self, handle: ConnHandle, packet: Vec<u8>) -> Result<()> {
            self.sent.push((handle, packet));
            Ok(())
        }
    }

    #[test]
    fn add_input_device_fails_once_every_slot_is_taken() {
        let config = Config { max_sessions: 1, ..Config::default() };
        let mut manager = Manager::new(&config);
        manager.add_input_device(usb::drivers::ds4::VID, usb::drivers::ds4::PID_V1).unwrap();
        let err = manager
            .add_input_device(usb::drivers::ds4::VID, usb::drivers::ds4::PID_V1)
            .unwrap_err();
        assert_eq!(err, Error::NoFreeSession);
    }

    #[test]
    fn remove_input_device_frees_the_slot_for_reuse() {
        let config = Config { max_sessions: 1, ..Config::default() };
        let mut manager = Manager::new(&config);
        let mut hci = FakeHci::default();
        let mut l2cap = FakeL2cap::default();
        let id = manager.add_input_device(usb::drivers::ds4::VID, usb::drivers::ds4::PID_V1).unwrap();
        manager.remove_input_device(id, &mut hci, &mut l2cap);
        manager.add_input_device(usb::drivers::ds4::VID, usb::drivers::ds4::PID_V1).unwrap();
    }
}

/// A short-lived [`SessionCallbacks`] impl over a session's optional
/// device, looked up by index so [`Manager::tick`] doesn't need to borrow
/// both `sessions` and `devices` mutably through a single reference.
struct CallbacksHandle<'a> {
    devices: &'a mut [Option<Device>],
    idx: usize,
}

impl SessionCallbacks for CallbacksHandle<'_> {
    fn assigned(&mut self) {
        if let Some(device) = &mut self.devices[self.idx] {
            device.driver.assigned();
        }
    }

    fn disconnect(&mut self) {
        if let Some(device) = &mut self.devices[self.idx] {
            DriverCallbacks(device.driver.as_mut()).disconnect();
        }
    }

    fn set_leds(&mut self, leds: u8) {
        if let Some(device) = &mut self.devices[self.idx] {
            device.driver.set_leds(leds);
        }
    }
}
