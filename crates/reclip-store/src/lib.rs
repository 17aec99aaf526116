//! Job persistence for the reclip job service.
//!
//! [`JobRepository`] is the boundary the pipeline and the HTTP layer talk to.
//! Every mutation is applied atomically per job row and goes through the
//! transition rules on [`reclip_models::Job`].

pub mod error;
pub mod memory;
pub mod repo;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryJobRepository;
pub use repo::{DynJobRepository, JobRepository};
