//! Interview session lifecycle: evaluation, serialization and writing

pub mod evaluator;
pub mod locks;
pub mod writer;

pub use evaluator::{decide, evaluate, Decision, EvaluationRequest, RejectReason, SessionRules};
pub use locks::InterviewLocks;
pub use writer::{SubmissionOutcome, TranscriptSubmission, TranscriptWriter};
