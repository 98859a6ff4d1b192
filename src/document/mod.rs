//! Document model handled by the store: values, identifiers and their storage form.

pub mod extended;
mod oid;
mod value;

pub use oid::{ObjectId, ObjectIdError};
pub use value::{document_from_json, Document, Value, ID_FIELD};
