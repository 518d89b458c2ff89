pub mod availability_service;
pub mod match_service;
pub mod rematch;

pub use availability_service::{AvailabilityConfigService, SlotChange};
pub use match_service::{FeedbackOutcome, MatchService};
pub use rematch::{RematchJob, RematchQueue, RematchReason, RematchWorker};
