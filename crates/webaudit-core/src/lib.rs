//! WebAudit Core - Foundation types and error handling
//!
//! This crate provides the core abstractions shared by every WebAudit crate:
//! - `TargetUrl`: A normalized, origin-scoped URL that is a unit of scan work
//! - `RawFinding`: One alert as reported by the scanning engine
//! - `UrlOutcome` / `BatchOutcome`: What the orchestrator hands to the report processor
//! - `Risk`, `Confidence`, `Effort`: Core rating enums

pub mod error;
pub mod finding;
pub mod outcome;
pub mod risk;
pub mod target;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use finding::{FindingInstance, RawFinding};
pub use outcome::{BatchOutcome, ScanTermination, UrlOutcome, UrlState};
pub use risk::{impact_score, Confidence, Effort, Risk};
pub use target::{normalize_url, origin_of, TargetUrl};
