//! Request extractors.

mod identity;

pub use identity::{CallerIdentity, REMOTE_USER_HEADER};
