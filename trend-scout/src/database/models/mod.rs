//! Database models (row types) for trend-scout.

pub mod candidate;
pub mod job;

pub use candidate::CandidateDbModel;
pub use job::{JobCounts, JobDbModel, JobPayload, JobStatus, JobType, NewJob};
