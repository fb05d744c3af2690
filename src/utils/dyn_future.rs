use std::future::Future;
use std::pin::Pin;

/// Boxed future as returned by driver methods
pub type DynFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
