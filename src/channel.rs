//! Optional user-facing channel stub.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

use crate::error::DriverError;

/// Placeholder read/write channel attached alongside a bound peripheral.
///
/// Open and close only track bookkeeping. No data contract exists on this
/// surface, so read and write fail unconditionally and never touch the
/// caller's buffer.
#[derive(Debug, Default)]
pub struct UserChannel {
    opens: AtomicUsize,
}

impl UserChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) -> Result<(), DriverError> {
        let open = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("user channel opened ({open} open)");
        Ok(())
    }

    pub fn close(&self) -> Result<(), DriverError> {
        let _ = self
            .opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        debug!("user channel closed");
        Ok(())
    }

    /// Number of opens without a matching close.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn read(&self, _buf: &mut [u8]) -> Result<usize, DriverError> {
        Err(DriverError::InvalidOperation)
    }

    pub fn write(&self, _buf: &[u8]) -> Result<usize, DriverError> {
        Err(DriverError::InvalidOperation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_and_write_are_unsupported_and_leave_the_buffer_alone() {
        let channel = UserChannel::new();
        let mut buf = [0xa5u8; 16];
        assert!(matches!(
            channel.read(&mut buf),
            Err(DriverError::InvalidOperation)
        ));
        assert_eq!(buf, [0xa5u8; 16]);
        assert!(matches!(
            channel.write(&buf),
            Err(DriverError::InvalidOperation)
        ));
    }

    #[test]
    fn open_close_bookkeeping_balances() {
        let channel = UserChannel::new();
        channel.open().unwrap();
        channel.open().unwrap();
        assert_eq!(channel.open_count(), 2);
        channel.close().unwrap();
        channel.close().unwrap();
        assert_eq!(channel.open_count(), 0);
        // An unmatched close stays at zero rather than wrapping.
        channel.close().unwrap();
        assert_eq!(channel.open_count(), 0);
    }
}
