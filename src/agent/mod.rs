//! Assistant module: command parsing and the channel message loop.

pub mod assistant;
pub mod submission;

pub use assistant::{Assistant, DEFAULT_SESSION_IDLE_TIMEOUT};
pub use submission::{Submission, SubmissionParser};
