//! Locker assignment records.

use serde::{Deserialize, Serialize};

use crate::types::Passcode;

/// The person or job a locker is assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    /// Name or job number.
    pub id: String,
    /// Where the passcode notice is delivered, if anywhere.
    pub email: Option<String>,
}

impl Occupant {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Persisted assignment state of one locker.
///
/// `occupied` is true exactly when `passcode` holds a non-empty value. A
/// locker with no record at all is free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockerRecord {
    pub occupied: bool,
    pub occupant_id: Option<String>,
    pub occupant_email: Option<String>,
    pub passcode: Option<String>,
}

impl LockerRecord {
    /// Builds the record written when a locker is assigned.
    pub fn occupied_by(occupant: &Occupant, passcode: &Passcode) -> Self {
        Self {
            occupied: true,
            occupant_id: Some(occupant.id.clone()),
            occupant_email: occupant.email.clone(),
            passcode: Some(passcode.expose().to_string()),
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    /// Returns true if the occupied flag agrees with the passcode.
    pub fn is_consistent(&self) -> bool {
        let has_passcode = self
            .passcode
            .as_deref()
            .is_some_and(|code| !code.trim().is_empty());
        self.occupied == has_passcode
    }
}
