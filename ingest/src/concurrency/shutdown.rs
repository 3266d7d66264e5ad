//! Shutdown signalling between the process and a running pipeline.

use tokio::sync::watch;

/// Outcome of an operation that may be cut short by a shutdown request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult<T, I> {
    Ok(T),
    /// Shutdown was requested; carries whatever was in flight.
    Shutdown(I),
}

impl<T, I> ShutdownResult<T, I> {
    pub fn is_shutdown(&self) -> bool {
        matches!(self, ShutdownResult::Shutdown(_))
    }
}

pub type ShutdownRx = watch::Receiver<()>;

/// Sending half of the shutdown channel. Cloning yields another handle to the same channel.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<()>);

impl ShutdownTx {
    /// Notifies every subscriber. Fails only when nobody is listening anymore.
    pub fn shutdown(&self) -> Result<(), watch::error::SendError<()>> {
        self.0.send(())
    }

    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());
    (ShutdownTx(tx), rx)
}
