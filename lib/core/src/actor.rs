//! Caller identity, as handed over by the external auth collaborator.
//!
//! This crate does NOT depend on any specific auth module. Hosts resolve
//! the session themselves and inject an [`Actor`] snapshot; audit rows
//! store it verbatim.

use serde::{Deserialize, Serialize};

/// Snapshot of the caller's identity at the time of a mutation.
///
/// Stored as-is in audit rows; never re-resolved against the live user
/// directory, so a later rename or account deletion does not rewrite
/// history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub uid: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,
}

impl Actor {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: None,
            email: None,
        }
    }
}
