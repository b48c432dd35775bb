pub mod limiter;
pub mod mongo_store;
pub mod store;

pub use limiter::{
    client_key, KeyGenerator, RateLimitConfig, RateLimitDecision, RateLimitStatus, RateLimiter,
    ANONYMOUS_KEY,
};
pub use mongo_store::MongoRateLimitStore;
pub use store::{spawn_sweeper, InMemoryRateLimitStore, RateLimitBucket, RateLimitStore};
