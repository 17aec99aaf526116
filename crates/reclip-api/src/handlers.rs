//! Request handlers.

pub mod formats;
pub mod health;
pub mod jobs;

pub use formats::*;
pub use health::*;
pub use jobs::*;
