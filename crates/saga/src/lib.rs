//! Locker assignment sagas.
//!
//! Assigning a locker touches three systems that cannot share a transaction:
//! the local store, the lock controller and the occupant's mailbox. The
//! occupy saga runs them in that order:
//! 1. Reserve the locker in the local store
//! 2. Confirm the assignment with the controller
//! 3. Notify the occupant (optional)
//!
//! If any step fails, previously completed steps are compensated in reverse
//! order. The unlock saga asks the controller first and only then releases
//! the local record, so a refused unlock never frees a locker on paper.

pub mod coordinator;
pub mod error;
pub mod events;
pub mod passcode;
pub mod run;
pub mod services;
pub mod state;
pub mod steps;

pub use coordinator::{
    AssignmentOrchestrator, DEFAULT_NOTIFY_TIMEOUT, OccupyReport, OccupyRequest, SyncReport,
    UnlockReport,
};
pub use error::{RemoteOperation, Result, Rollback, SagaError};
pub use events::SagaEvent;
pub use passcode::{
    DEFAULT_PASSCODE_LENGTH, DerivedPasscode, PasscodeGenerator, PasscodePolicy, RandomDigits,
    UnknownPolicy,
};
pub use run::SagaRun;
pub use services::{
    ConsoleNotifier, GRAPH_SEND_MAIL_URL, GraphMailNotifier, InMemoryNotifier,
    NotificationChannel, NotificationError, PasscodeNotice,
};
pub use state::{Flow, FlowState, OccupyState, UnlockState};
