//! Outbound services used by the sagas besides the store and the controller.

pub mod mail;
pub mod notification;

pub use mail::{GRAPH_SEND_MAIL_URL, GraphMailNotifier};
pub use notification::{
    ConsoleNotifier, InMemoryNotifier, NotificationChannel, NotificationError, PasscodeNotice,
};
