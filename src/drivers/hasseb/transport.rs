use crate::utils::dyn_future::DynFuture;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Device error: {0}")]
    Device(String),
    #[error("Receive queue already taken")]
    AlreadySubscribed,
    #[error("Transport closed")]
    Closed,
}

/// Connection to the adapter.
///
/// Received reports are delivered through the queue returned by
/// `subscribe`. There is only one such queue per connection.
pub trait HassebTransport: Send {
    fn write(&mut self, data: &[u8]) -> DynFuture<'_, Result<(), TransportError>>;

    /// Returns `None` if the queue has already been taken
    fn subscribe(&mut self) -> Option<mpsc::Receiver<Vec<u8>>>;

    fn close(&mut self);
}
