//! Shared value types for the locker assignment system.

pub mod record;
pub mod types;

pub use record::{LockerRecord, Occupant};
pub use types::{InvalidPasscode, LockerId, Passcode, SagaId};
