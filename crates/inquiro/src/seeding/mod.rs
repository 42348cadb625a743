//! Knowledge-base seeding from raw email threads

pub mod mock;
pub mod pipeline;
pub mod rate_limit;

pub use mock::mock_extractions;
pub use pipeline::{SeedReport, Seeder};
pub use rate_limit::{process_with_rate_limit, RateLimiter};
