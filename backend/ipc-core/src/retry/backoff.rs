//! Exponential backoff schedule.

use models::RetryPolicy;

/// Delay before attempt `attempt` (1-indexed).
///
/// The first attempt never waits. From the second on the delay is
/// `base_delay_ms * 2^(attempt - 2)`, capped at `max_delay_ms`.
pub fn delay_ms(policy: &RetryPolicy, attempt: u32) -> u64 {
    if attempt <= 1 {
        return 0;
    }

    let exponent = attempt - 2;
    let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);

    policy
        .base_delay_ms
        .saturating_mul(factor)
        .min(policy.max_delay_ms)
}
