pub mod document;
pub mod error;
pub mod file;
pub mod memory;
pub mod snapshot;
pub mod store;

pub use common::{LockerId, LockerRecord, Occupant, Passcode};
pub use document::LockerDocument;
pub use error::{Result, StoreError};
pub use file::JsonFileStore;
pub use memory::InMemoryLockerStore;
pub use snapshot::Snapshot;
pub use store::{LockerStore, OccupancyView};
