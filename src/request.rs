use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;

/// The kind of operation a trace line records. Only `Get` participates in
/// cache accounting; everything else is parsed but ignored by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestType {
    Get,
    Set,
    Delete,
    Other,
}

/// One immutable line of the trace: an application id, an object id, a
/// size in bytes, and an operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub app_id: i32,
    pub object_id: i64,
    pub size: u32,
    #[serde(rename = "type")]
    pub kind: RequestType,
}

impl Request {
    pub fn new(app_id: i32, object_id: i64, size: u32, kind: RequestType) -> Self {
        Request { app_id, object_id, size, kind }
    }

    /// Convenience constructor for the common case of a `GET` trace line.
    pub fn get(app_id: i32, object_id: i64, size: u32) -> Self {
        Request::new(app_id, object_id, size, RequestType::Get)
    }

    pub fn candidate(&self) -> Candidate {
        Candidate::new(self.app_id, self.object_id)
    }

    pub fn is_get(&self) -> bool {
        self.kind == RequestType::Get
    }
}
