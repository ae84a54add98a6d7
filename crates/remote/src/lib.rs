//! Remote lock controller transports.
//!
//! The orchestrator talks to the controller only through [`RemoteController`].
//! Two strategies implement it over HTTP:
//!
//! - [`SignalTransport`] sends one signal per step to `POST /actions` and
//!   reads the controller's verdict.
//! - [`BulkTransport`] downloads the full controller document, edits it, and
//!   uploads it again.
//!
//! [`InMemoryController`] is a stand-in controller for tests and offline use.

pub mod bulk;
pub mod client;
pub mod error;
pub mod memory;
pub mod signal;
pub mod transport;
pub mod wire;

pub use bulk::BulkTransport;
pub use client::ControllerClient;
pub use error::{RemoteError, Result};
pub use memory::InMemoryController;
pub use signal::SignalTransport;
pub use transport::{RemoteController, Transport, TransportStrategy, UnknownStrategy};
pub use wire::{ActionResponse, Approved, ControllerDocument, RawState, RemoteSignal, Signal};
