//! Background services run alongside the HTTP server.

pub mod outcomes;
pub mod retention;

pub use outcomes::log_outcomes;
pub use retention::RetentionSweeper;
