//! Handlers for board actions and server notifications.
//!
//! Bulk transitions, single-item rejection, serving, and realtime
//! invalidation each live in their own handler. Each one refetches the
//! buckets it touched through [`refresh::BucketRefresher`] once the server
//! has answered.

pub mod realtime;
pub mod refresh;
pub mod rejection;
pub mod serve;
pub mod transition;

pub use realtime::RealtimeHandler;
pub use refresh::BucketRefresher;
pub use rejection::{RejectionError, RejectionHandler};
pub use serve::{ServeError, ServeHandler};
pub use transition::{NoOpReason, TransitionCoordinator, TransitionError, TransitionOutcome};
