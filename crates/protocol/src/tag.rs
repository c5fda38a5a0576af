use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one admitted connection.
///
/// Assigned sequentially from a process-lifetime counter, so two
/// concurrently registered connections never share an id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The composite identifier stamped on engine-bound requests.
///
/// Encoded as `"<conn>:<original>"`. The left segment is always the decimal
/// connection id, so a client-chosen `original` containing `:` can never be
/// misread as a tag boundary: parsing splits on the first `:` and requires
/// the left segment to be a bare `u64`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedRequestId {
    pub conn: ConnId,
    pub original: String,
}

impl TaggedRequestId {
    pub fn new(conn: ConnId, original: impl Into<String>) -> Self {
        Self {
            conn,
            original: original.into(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}:{}", self.conn, self.original)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (left, right) = raw.split_once(':')?;
        let conn = left.parse::<u64>().ok()?;
        Some(Self {
            conn: ConnId(conn),
            original: right.to_string(),
        })
    }
}
