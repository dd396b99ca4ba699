//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use uuid::Uuid;

/// Rate limiter keyed by user id
pub type UserLimiter = RateLimiter<Uuid, DefaultKeyedStateStore<Uuid>, DefaultClock>;

/// Create a per-user rate limiter with the specified requests per second
pub fn create_user_limiter(requests_per_second: u32) -> Arc<UserLimiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::keyed(quota))
}

/// Per-user limit on turn submissions
#[derive(Clone)]
pub struct TurnRateLimiter {
    limiter: Arc<UserLimiter>,
}

impl TurnRateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            limiter: create_user_limiter(requests_per_second),
        }
    }

    /// Check if a submission is allowed (returns true if allowed)
    pub fn check(&self, user_id: Uuid) -> bool {
        self.limiter.check_key(&user_id).is_ok()
    }

    /// Forget users whose quota has fully replenished; returns how many remain tracked
    pub fn prune(&self) -> usize {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        self.limiter.len()
    }
}
