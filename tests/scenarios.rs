//! End-to-end scenario tests driving the public [`Manager`] API against an
//! in-memory fake transport, per `§8` of the specification ("Concrete
//! end-to-end scenarios").

use std::cell::RefCell;
use std::rc::Rc;

use fakewiimote::addr::BdAddr;
use fakewiimote::error::Result;
use fakewiimote::hci::ConnHandle;
use fakewiimote::l2cap::codec::decode_signal_commands;
use fakewiimote::l2cap::{Psm, SignalCode};
use fakewiimote::transport::{HciTransport, L2capTransport};
use fakewiimote::{Config, Manager};

/// A decoded L2CAP signalling command with its payload copied out, so
/// callers aren't tied to the lifetime of a borrow of [`FakeTransport`]'s
/// shared recording state.
struct OwnedSignalCommand {
    code: u8,
    ident: u8,
    payload: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    requested_connection: Vec<(BdAddr, [u8; 3], u8)>,
    events: Vec<Vec<u8>>,
    sent: Vec<(ConnHandle, Vec<u8>)>,
    next_handle: u16,
}

/// `Manager::tick`/`handle_hci_command`/`handle_l2cap_signal` each take two
/// distinct `&mut dyn …Transport` parameters (one HCI, one L2CAP), the same
/// way `fakewiimoted`'s `NullHci`/`NullL2cap` are two separate collaborator
/// objects. Tests want a single recorder they can assert against, so
/// `FakeTransport` is a cheap `Rc<RefCell<_>>` handle onto shared state:
/// cloning it yields a second, independently-borrowable handle to the same
/// recording, rather than a second mutable borrow of the same value.
#[derive(Clone, Default)]
struct FakeTransport(Rc<RefCell<Inner>>);

impl HciTransport for FakeTransport {
    fn request_connection(&mut self, bd_addr: BdAddr, class: [u8; 3], link_type: u8) -> bool {
        self.0.borrow_mut().requested_connection.push((bd_addr, class, link_type));
        true
    }

    fn enqueue_event(&mut self, event: Vec<u8>) -> Result<()> {
        self.0.borrow_mut().events.push(event);
        Ok(())
    }

    fn alloc_con_handle(&mut self) -> ConnHandle {
        let mut inner = self.0.borrow_mut();
        inner.next_handle += 1;
        ConnHandle::new(inner.next_handle)
    }
}

impl L2capTransport for FakeTransport {
    fn send(&mut self, handle: ConnHandle, packet: Vec<u8>) -> Result<()> {
        self.0.borrow_mut().sent.push((handle, packet));
        Ok(())
    }
}

impl FakeTransport {
    fn requested_connection_count(&self) -> usize {
        self.0.borrow().requested_connection.len()
    }

    fn first_requested_connection(&self) -> (BdAddr, [u8; 3], u8) {
        self.0.borrow().requested_connection[0]
    }

    fn event_count(&self) -> usize {
        self.0.borrow().events.len()
    }

    fn sent_count(&self) -> usize {
        self.0.borrow().sent.len()
    }

    /// Decodes the signalling commands in the `n`th packet sent, skipping
    /// the 4-byte L2CAP data header. Panics if packet `n` isn't on the
    /// signalling CID; callers only use this on packets known to be
    /// `CONNECT_REQ`/`CONFIG_REQ`.
    fn signal_commands(&self, n: usize) -> Vec<OwnedSignalCommand> {
        let inner = self.0.borrow();
        let (_, pkt) = &inner.sent[n];
        decode_signal_commands(&pkt[4..])
            .unwrap()
            .into_iter()
            .map(|c| OwnedSignalCommand { code: c.code, ident: c.ident, payload: c.payload.to_vec() })
            .collect()
    }

    /// Like [`Self::signal_commands`] but tolerant of packet `n` not being a
    /// signalling-channel packet (returns `None` instead of panicking).
    fn signal_commands_checked(&self, n: usize) -> Option<Vec<OwnedSignalCommand>> {
        let inner = self.0.borrow();
        let (_, pkt) = inner.sent.get(n)?;
        decode_signal_commands(&pkt[4..]).ok().map(|cmds| {
            cmds.into_iter()
                .map(|c| OwnedSignalCommand { code: c.code, ident: c.ident, payload: c.payload.to_vec() })
                .collect()
        })
    }

    /// The HID framing byte, report ID, and body of the `n`th packet sent.
    fn hid_report(&self, n: usize) -> (u8, u8, Vec<u8>) {
        let inner = self.0.borrow();
        let (_, pkt) = &inner.sent[n];
        (pkt[4], pkt[5], pkt[6..].to_vec())
    }
}

fn encode_hci_command(opcode: u16, params: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(3 + params.len());
    buf.extend_from_slice(&opcode.to_le_bytes());
    #[allow(clippy::cast_possible_truncation)]
    buf.push(params.len() as u8);
    buf.extend_from_slice(params);
    buf
}

const OPCODE_ACCEPT_CONNECTION_REQUEST: u16 = 0x0409;

fn encode_accept_connection_request(bd_addr: BdAddr, role: u8) -> Vec<u8> {
    let mut params = Vec::with_capacity(7);
    params.extend_from_slice(bd_addr.as_bytes());
    params.push(role);
    encode_hci_command(OPCODE_ACCEPT_CONNECTION_REQUEST, &params)
}

fn encode_signal_cmd(code: SignalCode, ident: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.push(code as u8);
    buf.push(ident);
    #[allow(clippy::cast_possible_truncation)]
    buf.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

fn encode_connect_rsp(ident: u8, dcid: u16, scid: u16, result: u16) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8);
    payload.extend_from_slice(&dcid.to_le_bytes());
    payload.extend_from_slice(&scid.to_le_bytes());
    payload.extend_from_slice(&result.to_le_bytes());
    payload.extend_from_slice(&0_u16.to_le_bytes()); // status: NO_INFO
    encode_signal_cmd(SignalCode::ConnectRsp, ident, &payload)
}

fn encode_config_req_mtu(ident: u8, dcid: u16, mtu: u16) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8);
    payload.extend_from_slice(&dcid.to_le_bytes());
    payload.extend_from_slice(&0_u16.to_le_bytes()); // flags
    payload.push(0x01); // MTU option type
    payload.push(2); // option length
    payload.extend_from_slice(&mtu.to_le_bytes());
    encode_signal_cmd(SignalCode::ConfigReq, ident, &payload)
}

fn encode_config_rsp(ident: u8, scid: u16, result: u16) -> Vec<u8> {
    let mut payload = Vec::with_capacity(6);
    payload.extend_from_slice(&scid.to_le_bytes());
    payload.extend_from_slice(&0_u16.to_le_bytes()); // flags
    payload.extend_from_slice(&result.to_le_bytes());
    encode_signal_cmd(SignalCode::ConfigRsp, ident, &payload)
}

const DS4_VID: u16 = 0x054c;
const DS4_PID: u16 = 0x05c4;

/// Builds a minimal DS4 input report. `face_bits` are OR'd onto the
/// neutral D-pad hat value (`0x08`) in `BUTTONS_1`, matching the DS4's
/// "no direction pressed" encoding.
fn ds4_report(face_bits: u8) -> [u8; 10] {
    let mut r = [0_u8; 10];
    r[0] = 0x01;
    r[5] = 0x08 | face_bits;
    r
}

/// Scenario 1: inserting a DS4 and ticking issues exactly one
/// `hci_request_connection` for `bd_addr = f(0)`.
#[test]
fn insert_device_requests_connection_once() {
    let config = Config::default();
    let mut manager = Manager::new(&config);
    let t = FakeTransport::default();

    manager.add_input_device(DS4_VID, DS4_PID).unwrap();
    for _ in 0..5 {
        manager.tick(&mut t.clone(), &mut t.clone());
    }

    assert_eq!(t.requested_connection_count(), 1);
    assert_eq!(t.first_requested_connection().0, BdAddr::for_session(0));
}

/// Scenario 2: accepting the connection request emits
/// `COMMAND_STATUS`, `ROLE_CHANGE`, `CONNECTION_COMPLETE`, and the next
/// tick opens the HID-Control channel at `scid = 0x40`.
#[test]
fn accept_connection_then_opens_hid_control() {
    let config = Config::default();
    let mut manager = Manager::new(&config);
    let t = FakeTransport::default();

    manager.add_input_device(DS4_VID, DS4_PID).unwrap();
    manager.tick(&mut t.clone(), &mut t.clone());

    let bd_addr = BdAddr::for_session(0);
    let accept = encode_accept_connection_request(bd_addr, 0x00 /* master */);
    manager.handle_hci_command(&accept, &mut t.clone(), &mut t.clone()).unwrap();

    assert_eq!(t.event_count(), 3, "command_status, role_change, connection_complete");

    manager.tick(&mut t.clone(), &mut t.clone());
    assert_eq!(t.sent_count(), 1);
    let cmds = t.signal_commands(0);
    assert_eq!(cmds.len(), 1);
    assert_eq!(cmds[0].code, SignalCode::ConnectReq as u8);
    let psm = u16::from_le_bytes([cmds[0].payload[0], cmds[0].payload[1]]);
    assert_eq!(psm, Psm::HidControl as u16);
    let scid = u16::from_le_bytes([cmds[0].payload[2], cmds[0].payload[3]]);
    assert_eq!(scid, 0x0040);
}

/// Drives a freshly inserted DS4 through baseband acceptance and both HID
/// channels reaching `Complete`, answering every `CONNECT_REQ`/`CONFIG_REQ`
/// this core emits along the way. Settles once ten consecutive ticks
/// produce no further signalling traffic.
fn drive_to_linked(manager: &mut Manager, t: &FakeTransport) -> (fakewiimote::SessionId, ConnHandle) {
    let id = manager.add_input_device(DS4_VID, DS4_PID).unwrap();
    manager.tick(&mut t.clone(), &mut t.clone());

    let bd_addr = BdAddr::for_session(0);
    manager
        .handle_hci_command(&encode_accept_connection_request(bd_addr, 0x00), &mut t.clone(), &mut t.clone())
        .unwrap();
    let handle = ConnHandle::new(1);

    let mut remote_cid_for_local: std::collections::HashMap<u16, u16> = std::collections::HashMap::new();
    let mut next_remote_cid: u16 = 0x0081;
    let mut idle_ticks = 0;
    while idle_ticks < 10 {
        let before = t.sent_count();
        manager.tick(&mut t.clone(), &mut t.clone());
        if t.sent_count() == before {
            idle_ticks += 1;
            continue;
        }
        idle_ticks = 0;
        // A single tick can emit more than one signalling packet (e.g. a
        // CONFIG_REQ for each newly accepted channel), so answer every
        // packet appended by this tick, not just the last one.
        for n in before..t.sent_count() {
            let Some(cmds) = t.signal_commands_checked(n) else { continue };
            for cmd in cmds {
                if cmd.code == SignalCode::ConnectReq as u8 {
                    let scid = u16::from_le_bytes([cmd.payload[2], cmd.payload[3]]);
                    let remote_cid = next_remote_cid;
                    next_remote_cid += 1;
                    remote_cid_for_local.insert(scid, remote_cid);
                    let rsp = encode_connect_rsp(cmd.ident, remote_cid, scid, 0);
                    manager.handle_l2cap_signal(handle, &rsp, &mut t.clone(), &mut t.clone()).unwrap();
                    let cfg = encode_config_req_mtu(cmd.ident.wrapping_add(1), scid, 185);
                    manager.handle_l2cap_signal(handle, &cfg, &mut t.clone(), &mut t.clone()).unwrap();
                } else if cmd.code == SignalCode::ConfigReq as u8 {
                    let dcid = u16::from_le_bytes([cmd.payload[0], cmd.payload[1]]);
                    let local_cid = remote_cid_for_local
                        .iter()
                        .find(|&(_, &remote)| remote == dcid)
                        .map(|(&local, _)| local)
                        .unwrap_or(dcid);
                    let ok = encode_config_rsp(cmd.ident, local_cid, 0);
                    manager.handle_l2cap_signal(handle, &ok, &mut t.clone(), &mut t.clone()).unwrap();
                }
            }
        }
    }
    (id, handle)
}

/// Scenario 4: once linked, programming `REPORT_MODE(mode=0x30)` acks, and
/// a subsequent button change (via the DS4 driver decoding a USB report)
/// produces exactly one `0x30` data report on HID-Interrupt; an unchanged
/// report in the same non-continuous mode produces none.
#[test]
fn report_mode_then_button_change_emits_one_data_report() {
    let config = Config::default();
    let mut manager = Manager::new(&config);
    let t = FakeTransport::default();
    let (id, handle) = drive_to_linked(&mut manager, &t);

    let before = t.sent_count();
    let report_mode_payload = [0x12_u8, 0b0100, 0x30]; // ack=1, continuous=0, mode=BTN
    manager.handle_output_report(handle, &report_mode_payload, &mut t.clone()).unwrap();
    assert_eq!(t.sent_count(), before + 1, "REPORT_MODE with ack=1 emits exactly one ACK");
    let (frame_byte, report_id, _) = t.hid_report(t.sent_count() - 1);
    assert_eq!(frame_byte, 0xA1);
    assert_eq!(report_id, 0x22);

    // A report with buttons unchanged from the driver's last report (all
    // zero) produces no data report: mode is non-continuous and nothing
    // is dirty.
    let before = t.sent_count();
    manager.handle_usb_report(id, &ds4_report(0x00)).unwrap();
    manager.tick(&mut t.clone(), &mut t.clone());
    assert_eq!(t.sent_count(), before, "no data report on an unchanged, non-continuous mode");

    // A button change produces exactly one 0x30 data report.
    let before = t.sent_count();
    manager.handle_usb_report(id, &ds4_report(0x20)).unwrap(); // Cross pressed
    manager.tick(&mut t.clone(), &mut t.clone());
    assert_eq!(t.sent_count(), before + 1, "exactly one data report on button change");
    let (frame_byte, report_id, body) = t.hid_report(t.sent_count() - 1);
    assert_eq!(frame_byte, 0xA1);
    assert_eq!(report_id, 0x30);
    let buttons = u16::from_le_bytes([body[0], body[1]]);
    assert_ne!(buttons, 0, "cross press should set a wiimote button bit");

    // A further tick with no new change emits nothing more.
    let before = t.sent_count();
    manager.tick(&mut t.clone(), &mut t.clone());
    assert_eq!(t.sent_count(), before);
}

/// Builds a `READ_DATA` output report (report ID `0x17` plus its 6-byte
/// payload: `space`, `slave_addr`, big-endian `address`, big-endian `size`).
fn read_data_output_report(space: u8, slave_addr: u8, address: u16, size: u16) -> Vec<u8> {
    let mut buf = vec![fakewiimote::hid::output_report::READ_DATA, space, slave_addr];
    buf.extend_from_slice(&address.to_be_bytes());
    buf.extend_from_slice(&size.to_be_bytes());
    buf
}

/// Scenario 5: `READ_DATA` against the extension register window (`space =
/// SPACE_I2C_BUS`, `slave = EXTENSION_I2C_ADDR`, `address =
/// IDENTIFIER_BEGIN`) returns the Nunchuk identifier the DS4 driver
/// requested on `init` and the core materialised once linking finished.
#[test]
fn extension_read_data_reply_returns_nunchuk_identifier() {
    let config = Config::default();
    let mut manager = Manager::new(&config);
    let t = FakeTransport::default();
    let (_id, handle) = drive_to_linked(&mut manager, &t);

    let before = t.sent_count();
    let req = read_data_output_report(0x04 /* SPACE_I2C_BUS */, 0x52 /* EXTENSION_I2C_ADDR */, 0x00FA, 6);
    manager.handle_output_report(handle, &req, &mut t.clone()).unwrap();
    assert_eq!(t.sent_count(), before + 1);

    let (_, report_id, body) = t.hid_report(t.sent_count() - 1);
    assert_eq!(report_id, 0x21); // READ_DATA_REPLY
    // body: buttons(2) + (size_minus_one<<4|error)(1) + address(2) + data(16)
    assert_eq!(body[2], (6 - 1) << 4, "size_minus_one nibble, error 0");
    let data = &body[5..11];
    assert_eq!(data, [0x00, 0x00, 0xA4, 0x20, 0x00, 0x00], "Nunchuk identifier");
}

/// Scenario 6: a `READ_DATA` received while a previous multi-step read is
/// still in flight is acknowledged with `BUSY` (error code `0x04`) without
/// disturbing the in-flight cursor, which continues on the next tick.
#[test]
fn read_data_busy_ack_does_not_disturb_in_flight_cursor() {
    let config = Config::default();
    let mut manager = Manager::new(&config);
    let t = FakeTransport::default();
    let (_id, handle) = drive_to_linked(&mut manager, &t);

    // Start a long read (32 bytes) from EEPROM address 0, leaving a
    // cursor in flight after its first 16-byte step replies synchronously.
    let before = t.sent_count();
    let long_read = read_data_output_report(0x00 /* SPACE_EEPROM */, 0x00, 0x0000, 32);
    manager.handle_output_report(handle, &long_read, &mut t.clone()).unwrap();
    assert_eq!(t.sent_count(), before + 1, "first 16-byte step replies synchronously");
    let (_, report_id, _) = t.hid_report(t.sent_count() - 1);
    assert_eq!(report_id, 0x21); // READ_DATA_REPLY

    // A second READ_DATA while the cursor is still in flight is BUSY.
    let before = t.sent_count();
    let second_read = read_data_output_report(0x00, 0x00, 0x0000, 4);
    manager.handle_output_report(handle, &second_read, &mut t.clone()).unwrap();
    assert_eq!(t.sent_count(), before + 1);
    let (_, report_id, body) = t.hid_report(t.sent_count() - 1);
    assert_eq!(report_id, 0x22); // ACK
    assert_eq!(body[3], 0x04, "BUSY");

    // The in-flight cursor continues on the next tick (second 16-byte step
    // of the original 32-byte read).
    let before = t.sent_count();
    manager.tick(&mut t.clone(), &mut t.clone());
    assert_eq!(t.sent_count(), before + 1);
    let (_, report_id, _) = t.hid_report(t.sent_count() - 1);
    assert_eq!(report_id, 0x21); // READ_DATA_REPLY
}
