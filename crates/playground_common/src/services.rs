//! Shared async plumbing for the collaborator traits.
//!
//! The push SDK, app-server and gateway seams are object-safe traits whose
//! methods return boxed futures, so implementations can be swapped behind
//! an `Arc<dyn Trait>` (real clients in the binary, fakes in tests).

use std::future::Future;
use std::pin::Pin;

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;
