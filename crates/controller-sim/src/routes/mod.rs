pub mod actions;
pub mod details;
pub mod health;
pub mod metrics;
