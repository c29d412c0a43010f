//! Releasing the worker's shared connection around blocking work.

use std::sync::Arc;
use tracing::debug;

/// A pooled connection the worker holds on to between jobs.
///
/// While `disconnect_when_inactive` is on, the connection is given back as
/// soon as it goes idle and reopened on next use, so a worker that is busy
/// with something else does not occupy a slot of the shared budget.
pub trait PooledConnection: Send + Sync {
    /// Turn release-when-idle on or off.
    fn disconnect_when_inactive(&self, enabled: bool);
}

/// Scoped release of a [`PooledConnection`].
///
/// Creating the guard releases the connection; dropping it re-enables the
/// connection. Because re-enabling lives in `Drop`, it happens on every way
/// out of the scope: success, error return, or unwinding.
#[must_use = "the connection is re-enabled as soon as the guard is dropped"]
pub struct ReleasedConnection {
    connection: Option<Arc<dyn PooledConnection>>,
}

impl ReleasedConnection {
    /// Release `connection` (if there is one) until the guard is dropped.
    pub fn new(connection: Option<Arc<dyn PooledConnection>>) -> Self {
        if let Some(conn) = &connection {
            debug!("Releasing shared connection");
            conn.disconnect_when_inactive(true);
        }
        Self { connection }
    }
}

impl Drop for ReleasedConnection {
    fn drop(&mut self) {
        if let Some(conn) = &self.connection {
            debug!("Re-enabling shared connection");
            conn.disconnect_when_inactive(false);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every toggle it receives.
    #[derive(Default)]
    pub(crate) struct RecordingConnection {
        pub(crate) calls: Mutex<Vec<bool>>,
    }

    impl RecordingConnection {
        pub(crate) fn calls(&self) -> Vec<bool> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PooledConnection for RecordingConnection {
        fn disconnect_when_inactive(&self, enabled: bool) {
            self.calls.lock().unwrap().push(enabled);
        }
    }

    #[test]
    fn test_guard_releases_then_reenables() {
        let conn = Arc::new(RecordingConnection::default());
        {
            let _guard = ReleasedConnection::new(Some(conn.clone()));
            assert_eq!(conn.calls(), vec![true]);
        }
        assert_eq!(conn.calls(), vec![true, false]);
    }

    #[test]
    fn test_guard_reenables_on_panic() {
        let conn = Arc::new(RecordingConnection::default());
        let held = conn.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = ReleasedConnection::new(Some(held));
            panic!("command blew up");
        });
        assert!(result.is_err());
        assert_eq!(conn.calls(), vec![true, false]);
    }

    #[test]
    fn test_guard_without_connection_is_inert() {
        let _guard = ReleasedConnection::new(None);
    }
}
