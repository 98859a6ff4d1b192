//! Safe SQL builder: identifiers quoted, values as parameters.

mod builder;
pub use builder::*;
