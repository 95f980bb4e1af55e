use std::sync::Arc;

use crate::driver::DriverConnection;
use crate::error::SqlHandleError;

/// Source of live connections for a [`DbHandle`](crate::DbHandle).
///
/// A provider may hand out a fresh connection per `acquire` or lend one from a pool;
/// `release` either closes it or returns it. Providers are shared between handles, so
/// `acquire` must be callable concurrently when the provider is used from several threads.
pub trait ConnectionProvider {
    type Connection: DriverConnection;

    /// Obtain a live connection.
    ///
    /// # Errors
    /// Returns the backend or configuration error when no connection can be obtained.
    fn acquire(&self) -> Result<Self::Connection, SqlHandleError>;

    /// Give a connection back. The default closes it by dropping it.
    ///
    /// # Errors
    /// Returns the backend error if closing fails; handles log and suppress it.
    fn release(&self, conn: Self::Connection) -> Result<(), SqlHandleError> {
        drop(conn);
        Ok(())
    }
}

impl<P: ConnectionProvider + ?Sized> ConnectionProvider for &P {
    type Connection = P::Connection;

    fn acquire(&self) -> Result<Self::Connection, SqlHandleError> {
        (**self).acquire()
    }

    fn release(&self, conn: Self::Connection) -> Result<(), SqlHandleError> {
        (**self).release(conn)
    }
}

impl<P: ConnectionProvider + ?Sized> ConnectionProvider for Arc<P> {
    type Connection = P::Connection;

    fn acquire(&self) -> Result<Self::Connection, SqlHandleError> {
        (**self).acquire()
    }

    fn release(&self, conn: Self::Connection) -> Result<(), SqlHandleError> {
        (**self).release(conn)
    }
}
