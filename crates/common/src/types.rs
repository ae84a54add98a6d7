use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for one saga invocation.
///
/// Wraps a UUID so run identifiers cannot be confused with locker ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SagaId(Uuid);

impl SagaId {
    /// Creates a new random saga ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SagaId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SagaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of a physical locker (e.g. `"101"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockerId(String);

impl LockerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LockerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LockerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for LockerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Returned when an empty passcode is offered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("passcode must not be empty")]
pub struct InvalidPasscode;

/// The credential granting physical access to an occupied locker.
///
/// Always non-empty. `Debug` output is redacted so passcodes do not end up
/// in logs by accident; use [`Passcode::expose`] where the value is needed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Passcode(String);

impl Passcode {
    /// Creates a passcode, rejecting empty or whitespace-only values.
    pub fn new(code: impl Into<String>) -> Result<Self, InvalidPasscode> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(InvalidPasscode);
        }
        Ok(Self(code))
    }

    /// Returns the plain passcode.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Passcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Passcode(******)")
    }
}

impl TryFrom<String> for Passcode {
    type Error = InvalidPasscode;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        Self::new(code)
    }
}

impl From<Passcode> for String {
    fn from(code: Passcode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saga_id_new_creates_unique_ids() {
        assert_ne!(SagaId::new(), SagaId::new());
    }

    #[test]
    fn locker_id_orders_lexically() {
        let mut ids = vec![LockerId::from("302"), LockerId::from("101"), LockerId::from("202")];
        ids.sort();
        let expected: Vec<LockerId> = vec!["101".into(), "202".into(), "302".into()];
        assert_eq!(ids, expected);
    }

    #[test]
    fn locker_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&LockerId::from("101")).unwrap();
        assert_eq!(json, "\"101\"");
    }

    #[test]
    fn passcode_rejects_blank_values() {
        assert_eq!(Passcode::new(""), Err(InvalidPasscode));
        assert_eq!(Passcode::new("   "), Err(InvalidPasscode));
        assert_eq!(Passcode::new("111111").unwrap().expose(), "111111");
    }

    #[test]
    fn passcode_debug_is_redacted() {
        let code = Passcode::new("424242").unwrap();
        assert!(!format!("{code:?}").contains("424242"));
    }

    #[test]
    fn passcode_deserialization_enforces_non_empty() {
        assert!(serde_json::from_str::<Passcode>("\"\"").is_err());
        let code: Passcode = serde_json::from_str("\"9876\"").unwrap();
        assert_eq!(code.expose(), "9876");
    }
}
