//! HCI connection handles.

/// Connection handle allocated by the HCI layer's virtual allocator when a
/// session's baseband reaches `Complete` (`§3`, invariant 3).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(transparent)]
pub struct ConnHandle(u16);

impl ConnHandle {
    /// Wraps a raw handle returned by `hci_con_handle_virt_alloc`.
    #[inline]
    #[must_use]
    pub const fn new(h: u16) -> Self {
        Self(h)
    }

    /// Returns an invalid (unassigned) connection handle.
    #[inline]
    #[must_use]
    pub const fn invalid() -> Self {
        Self(0xFFFF)
    }

    /// Returns whether the handle has been assigned.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0xFFFF
    }
}

impl Default for ConnHandle {
    #[inline]
    fn default() -> Self {
        Self::invalid()
    }
}

impl From<ConnHandle> for u16 {
    #[inline]
    fn from(h: ConnHandle) -> Self {
        h.0
    }
}
