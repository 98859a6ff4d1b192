//! 12-byte object identifiers: 4-byte timestamp, 5-byte process value, 3-byte counter.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid object id '{0}': expected 24 hex digits")]
pub struct ObjectIdError(pub String);

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

const COUNTER_MASK: u32 = 0x00ff_ffff;

fn process_value() -> &'static [u8; 5] {
    static VALUE: OnceLock<[u8; 5]> = OnceLock::new();
    VALUE.get_or_init(|| {
        let seed = uuid::Uuid::new_v4();
        let mut out = [0u8; 5];
        out.copy_from_slice(&seed.as_bytes()[..5]);
        out
    })
}

fn counter() -> &'static AtomicU32 {
    static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let seed = uuid::Uuid::new_v4();
        let b = seed.as_bytes();
        AtomicU32::new(u32::from_be_bytes([0, b[13], b[14], b[15]]))
    })
}

impl ObjectId {
    /// Generate a fresh id. Ids generated in the same process are unique and
    /// sort by creation second.
    pub fn new() -> Self {
        let secs = chrono::Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32;
        let count = counter().fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;
        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(process_value());
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        ObjectId(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    pub fn parse_str(s: &str) -> Result<Self, ObjectIdError> {
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ObjectIdError(s.to_string()))?;
        Ok(ObjectId(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Creation time embedded in the first four bytes.
    pub fn timestamp(&self) -> chrono::DateTime<chrono::Utc> {
        let secs = u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]);
        chrono::DateTime::from_timestamp(secs as i64, 0).unwrap_or_default()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::new()
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}
