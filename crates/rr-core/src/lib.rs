//! rusty-ratings/crates/rr-core/src/lib.rs
//!
//! The central domain logic and interface definitions for Rusty-Ratings:
//! the aggregate cache, the verification heuristic and the rating service.

pub mod cache;
pub mod clock;
pub mod error;
pub mod models;
pub mod service;
pub mod traits;
pub mod verification;

// Re-exporting for easier access in other crates
pub use cache::AggregateCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::*;
pub use models::*;
pub use service::RatingService;
pub use traits::*;
pub use verification::{Breach, VerificationEngine, VerificationThresholds};
