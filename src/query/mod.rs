//! Query filters: built from request query strings, evaluated by the bundled stores.

pub mod matcher;
mod translator;

pub use matcher::matches;
pub use translator::{map_leaves, parse_filter, translate, QueryFilter, FILTER_PARAM};
