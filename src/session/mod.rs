//! Resilient session core
//!
//! - [`holder`]: the live transport + client pair behind a read/write lock
//! - [`error_classification`]: logical vs transport failures
//! - [`retry`]: call, reconnect, call once more
//! - [`reconnect`]: serialized re-establishment of the session

pub mod error;
pub mod error_classification;
pub mod holder;
pub mod reconnect;
pub(crate) mod retry;

pub use error::{Operation, SessionError};
pub use error_classification::{FailureClass, FailurePolicy};
pub use holder::{Session, SessionHolder};
pub use reconnect::{ReconnectOutcome, establish};
