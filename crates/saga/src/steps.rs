//! Step names recorded in saga runs and logs.

/// Occupy checks before any change: recipient, passcode and snapshot.
pub const STEP_PREPARE: &str = "prepare";

/// Occupy step 1: write the assignment to the local store.
pub const STEP_RESERVE_LOCAL: &str = "reserve_local";

/// Occupy step 2: ask the controller to hold the locker.
pub const STEP_CONFIRM_REMOTE: &str = "confirm_remote";

/// Occupy step 3: send the passcode to the occupant.
pub const STEP_NOTIFY: &str = "notify_occupant";

/// Fallback compensation when releasing the local record fails.
pub const STEP_RESTORE_SNAPSHOT: &str = "restore_snapshot";

/// Unlock step 1: ask the controller to open the locker.
pub const STEP_REQUEST_UNLOCK: &str = "request_unlock";

/// Unlock step 2: delete the local record.
pub const STEP_RELEASE_LOCAL: &str = "release_local";
