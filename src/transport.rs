//! Collaborator interfaces the core consumes but does not implement
//! (`§1` Out of scope, `§6`): the HCI transport, the L2CAP sender, and the
//! USB transport. Each is a trait so the state machines in [`crate::wiimote`]
//! and [`crate::manager`] can be driven by a real stack or by a test double.

use crate::addr::BdAddr;
use crate::error::Result;
use crate::hci::ConnHandle;

/// HCI-level primitives: issuing connection requests and enqueueing events
/// (`hci_request_connection`, `enqueue_hci_event_*`, `§6`).
pub trait HciTransport {
    /// Requests a baseband connection to `bd_addr` advertising `class` and
    /// `link_type`. Returns whether the request was accepted by the
    /// transport for processing (not whether the host will accept it).
    fn request_connection(&mut self, bd_addr: BdAddr, class: [u8; 3], link_type: u8) -> bool;

    /// Enqueues a fully encoded HCI event packet. `Err(Error::Busy)` means
    /// the caller should retry on the next tick.
    fn enqueue_event(&mut self, event: Vec<u8>) -> Result<()>;

    /// Allocates a fresh connection handle (`hci_con_handle_virt_alloc`).
    fn alloc_con_handle(&mut self) -> ConnHandle;
}

/// L2CAP-level primitives: sending signalling commands and channel data
/// (`l2cap_send_*`, `§6`).
pub trait L2capTransport {
    /// Sends a fully encoded L2CAP packet (4-byte header plus payload) over
    /// the ACL link identified by `handle`. `Err(Error::Busy)` means the
    /// caller should retry on the next tick.
    fn send(&mut self, handle: ConnHandle, packet: Vec<u8>) -> Result<()>;
}

/// USB-level primitives consumed by the driver framework (`§4.6`, `§6`).
pub trait UsbTransport {
    /// Starts (or restarts) an asynchronous interrupt-IN transfer on
    /// `endpoint` for `device`. Completion is delivered out-of-band to
    /// [`crate::usb::Driver::async_response`] by the embedder.
    fn issue_interrupt_transfer_async(
        &mut self,
        device: usize,
        endpoint: u8,
        len: usize,
    ) -> Result<()>;
}
