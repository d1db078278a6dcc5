//! Repository layer for database access.

pub mod candidate;
pub mod job;

pub use candidate::{CandidateRepository, SqlxCandidateRepository};
pub use job::{JobRepository, SqlxJobRepository};
