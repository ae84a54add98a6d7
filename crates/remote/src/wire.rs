//! Controller wire format.
//!
//! `POST /actions` takes a [`RemoteSignal`] and answers with an
//! [`ActionResponse`]; `GET /details` and `PUT /details` exchange the whole
//! controller document, `{"lockers": {"<id>": {"password": .., "jobid": ..}}}`.

use common::{LockerId, LockerRecord, Passcode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{RemoteError, Result};

/// Status marker of an approving controller response.
pub const STATUS_APPROVED: &str = "approved";

/// Status marker of a firmware error response.
pub const STATUS_ERROR: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Occupy,
    Unlock,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Occupy => "occupy",
            Signal::Unlock => "unlock",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body of `POST /actions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSignal {
    pub signal: Signal,
    pub locker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobid: Option<String>,
}

impl RemoteSignal {
    pub fn occupy(locker_id: &LockerId, passcode: &Passcode, occupant_id: &str) -> Self {
        Self {
            signal: Signal::Occupy,
            locker: locker_id.to_string(),
            password: Some(passcode.expose().to_string()),
            jobid: Some(occupant_id.to_string()),
        }
    }

    pub fn unlock(locker_id: &LockerId) -> Self {
        Self {
            signal: Signal::Unlock,
            locker: locker_id.to_string(),
            password: None,
            jobid: None,
        }
    }
}

/// Response body of `POST /actions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActionResponse {
    /// An approval, e.g. `{"status": "approved", "action": "occupied"}`.
    pub fn approved(action: &str) -> Self {
        let mut extra = Map::new();
        extra.insert("action".to_string(), Value::from(action));
        Self {
            status: STATUS_APPROVED.to_string(),
            extra,
        }
    }

    /// A refusal, e.g. `{"status": "error", "message": "Unknown signal"}`.
    pub fn error(message: impl Into<String>) -> Self {
        let mut extra = Map::new();
        extra.insert("message".to_string(), Value::from(message.into()));
        Self {
            status: STATUS_ERROR.to_string(),
            extra,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == STATUS_APPROVED
    }
}

/// A controller's approval of one signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Approved {
    /// The controller's response body.
    pub detail: Value,
}

impl Approved {
    pub(crate) fn from_response(response: &ActionResponse) -> Self {
        Self {
            detail: serde_json::to_value(response).unwrap_or(Value::Null),
        }
    }
}

/// The controller document exactly as the controller serves it.
///
/// Kept opaque so that pulling and pushing it back is lossless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawState(pub Value);

impl RawState {
    /// A controller with no occupied lockers.
    pub fn empty() -> Self {
        Self(json!({ "lockers": {} }))
    }

    /// Builds a controller document from local records.
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = (&'a LockerId, &'a LockerRecord)>,
    ) -> Self {
        Self::empty().with_records(records)
    }

    /// Replaces the locker map with `records`, keeping every other key.
    ///
    /// A document that is not an object is replaced as a whole.
    pub fn with_records<'a>(
        &self,
        records: impl IntoIterator<Item = (&'a LockerId, &'a LockerRecord)>,
    ) -> Self {
        let mut document = ControllerDocument::from_raw(self).unwrap_or_default();
        document.lockers.clear();
        for (locker_id, record) in records {
            if let Some(passcode) = record.passcode.as_deref() {
                document.insert(
                    locker_id,
                    passcode,
                    record.occupant_id.as_deref().unwrap_or_default(),
                );
            }
        }
        document.into_raw()
    }
}

/// Editable view of a [`RawState`]. Keys other than `lockers` are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerDocument {
    #[serde(default)]
    pub lockers: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ControllerDocument {
    pub fn from_raw(state: &RawState) -> Result<Self> {
        serde_json::from_value(state.0.clone()).map_err(|e| {
            RemoteError::Rejected(format!("unexpected controller document ({e}): {}", state.0))
        })
    }

    pub fn into_raw(self) -> RawState {
        RawState(serde_json::to_value(self).unwrap_or_else(|_| RawState::empty().0))
    }

    pub fn contains(&self, locker_id: &LockerId) -> bool {
        self.lockers.contains_key(locker_id.as_str())
    }

    pub fn insert(&mut self, locker_id: &LockerId, password: &str, jobid: &str) {
        self.lockers.insert(
            locker_id.to_string(),
            json!({ "password": password, "jobid": jobid }),
        );
    }

    pub fn remove(&mut self, locker_id: &LockerId) -> bool {
        self.lockers.remove(locker_id.as_str()).is_some()
    }
}
