//! In-memory form of the persisted store document.
//!
//! The canonical on-disk shape is a JSON object keyed by locker id:
//!
//! ```json
//! { "101": { "occupied": true, "occupant_id": "J1", "occupant_email": null, "passcode": "111111" } }
//! ```
//!
//! Reading also accepts the older shapes still found in the field:
//! `{name, email, passcode, is_occupied}` rows, `{jobid, passcode}` rows,
//! the controller's `password` key, and the controller's `{"lockers": {...}}`
//! wrapper.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::{LockerId, LockerRecord, Result, StoreError};

const CONTROLLER_WRAPPER_KEY: &str = "lockers";

/// Every occupied locker, keyed by id. Free lockers are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockerDocument {
    records: BTreeMap<LockerId, LockerRecord>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default, alias = "is_occupied")]
    occupied: Option<bool>,
    #[serde(default, alias = "name", alias = "jobid")]
    occupant_id: Option<String>,
    #[serde(default, alias = "email")]
    occupant_email: Option<String>,
    #[serde(default, alias = "password")]
    passcode: Option<String>,
}

impl LockerDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses raw file bytes in any supported shape.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Converts a JSON value in any supported shape.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut top) = value else {
            return Err(StoreError::Malformed(
                "top-level value is not an object".to_string(),
            ));
        };

        // Controller documents wrap the lockers and may carry firmware keys
        // next to them; only the lockers matter locally.
        if top
            .get(CONTROLLER_WRAPPER_KEY)
            .is_some_and(|wrapped| wrapped.is_object() && !is_record_row(wrapped))
            && let Some(Value::Object(inner)) = top.remove(CONTROLLER_WRAPPER_KEY)
        {
            if !top.is_empty() {
                tracing::debug!(
                    ignored = ?top.keys().collect::<Vec<_>>(),
                    "ignoring controller keys outside the locker map"
                );
            }
            top = inner;
        }

        let mut records = BTreeMap::new();
        for (id, entry) in top {
            if !entry.is_object() {
                return Err(StoreError::Malformed(format!(
                    "entry for locker {id} is not an object"
                )));
            }
            let raw: RawRecord = serde_json::from_value(entry)?;
            let locker_id = LockerId::new(id);
            if let Some(record) = normalize(&locker_id, raw)? {
                records.insert(locker_id, record);
            }
        }

        Ok(Self { records })
    }

    /// Renders the canonical pretty-printed form, keys sorted.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(&self.records)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    pub fn get(&self, locker_id: &LockerId) -> Option<&LockerRecord> {
        self.records.get(locker_id)
    }

    pub fn insert(&mut self, locker_id: LockerId, record: LockerRecord) -> Option<LockerRecord> {
        self.records.insert(locker_id, record)
    }

    pub fn remove(&mut self, locker_id: &LockerId) -> Option<LockerRecord> {
        self.records.remove(locker_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LockerId, &LockerRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Occupancy flag per known locker.
    pub fn occupancy(&self) -> BTreeMap<LockerId, bool> {
        self.records
            .iter()
            .map(|(id, record)| (id.clone(), record.is_occupied()))
            .collect()
    }
}

impl FromIterator<(LockerId, LockerRecord)> for LockerDocument {
    fn from_iter<T: IntoIterator<Item = (LockerId, LockerRecord)>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Keys that mark an object as one locker's row rather than a locker map.
const RECORD_KEYS: &[&str] = &[
    "occupied",
    "is_occupied",
    "occupant_id",
    "name",
    "jobid",
    "occupant_email",
    "email",
    "passcode",
    "password",
];

fn is_record_row(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|row| RECORD_KEYS.iter().any(|key| row.contains_key(*key)))
}

/// Maps a raw row onto the record model. Rows that describe a free locker
/// (explicit `occupied: false`, or no passcode) collapse to `None`.
fn normalize(locker_id: &LockerId, raw: RawRecord) -> Result<Option<LockerRecord>> {
    let passcode = raw.passcode.filter(|code| !code.trim().is_empty());

    match (raw.occupied, passcode) {
        (Some(true), None) => Err(StoreError::Malformed(format!(
            "locker {locker_id} is marked occupied but has no passcode"
        ))),
        (Some(false), _) | (None, None) => Ok(None),
        (_, Some(passcode)) => Ok(Some(LockerRecord {
            occupied: true,
            occupant_id: raw.occupant_id,
            occupant_email: raw.occupant_email,
            passcode: Some(passcode),
        })),
    }
}
