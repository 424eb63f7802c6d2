use std::{future::Future, time::Duration};

use crate::{Error, Result};

/// Bounded retry with exponential delay and deterministic jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
	max_attempts: u32,
	base_delay: Duration,
	max_delay: Duration,
	jitter_ratio: f32,
}
impl RetryPolicy {
	pub fn new(
		max_attempts: u32,
		base_delay: Duration,
		max_delay: Duration,
		jitter_ratio: f32,
	) -> Self {
		Self {
			max_attempts: max_attempts.max(1),
			base_delay,
			max_delay: max_delay.max(base_delay),
			jitter_ratio: jitter_ratio.clamp(0.0, 1.0),
		}
	}

	pub fn from_config(cfg: &flagstate_config::Retry) -> Self {
		Self::new(
			cfg.max_attempts,
			Duration::from_millis(cfg.base_delay_ms),
			Duration::from_millis(cfg.max_delay_ms),
			cfg.jitter_ratio,
		)
	}

	/// Delay before retry number `retry` (1-based). The jitter share is derived from `key`, so the
	/// same request waits the same amount on every run.
	pub fn delay_for(&self, retry: u32, key: &str) -> Duration {
		let exponent = retry.saturating_sub(1).min(20);
		let base_ms = self.base_delay.as_millis() as u64;
		let max_ms = self.max_delay.as_millis() as u64;
		let delay_ms = base_ms.saturating_mul(1_u64 << exponent).min(max_ms);
		let jitter_ms =
			(delay_ms as f64 * self.jitter_ratio as f64 * jitter_fraction(retry, key)) as u64;

		Duration::from_millis(delay_ms.saturating_add(jitter_ms).min(max_ms))
	}

	/// Runs `op` until it succeeds, fails with a non-retryable error, or attempts run out. The
	/// closure receives the 1-based attempt number.
	pub async fn run<T, F, Fut>(&self, key: &str, mut op: F) -> Result<T>
	where
		F: FnMut(u32) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut attempt = 1;

		loop {
			match op(attempt).await {
				Ok(value) => return Ok(value),
				Err(err) if attempt < self.max_attempts && err.is_retryable() => {
					let delay = self.delay_for(attempt, key);

					tracing::warn!(
						attempt,
						max_attempts = self.max_attempts,
						delay_ms = delay.as_millis() as u64,
						error = %err,
						"Retrying provider call."
					);
					tokio::time::sleep(delay).await;

					attempt += 1;
				},
				Err(err) => return Err(give_up(err, attempt)),
			}
		}
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::from_config(&flagstate_config::Retry::default())
	}
}

fn jitter_fraction(retry: u32, key: &str) -> f64 {
	let mut hasher = blake3::Hasher::new();

	hasher.update(key.as_bytes());
	hasher.update(&retry.to_le_bytes());

	let hash = hasher.finalize();
	let mut bytes = [0_u8; 8];

	bytes.copy_from_slice(&hash.as_bytes()[..8]);

	u64::from_le_bytes(bytes) as f64 / u64::MAX as f64
}

fn give_up(err: Error, attempt: u32) -> Error {
	if attempt > 1 {
		tracing::warn!(attempt, error = %err, "Provider call failed after retries.");
	}

	err
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn delay_grows_exponentially_and_is_capped() {
		let policy =
			RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(1_000), 0.0);

		assert_eq!(policy.delay_for(1, "k"), Duration::from_millis(100));
		assert_eq!(policy.delay_for(2, "k"), Duration::from_millis(200));
		assert_eq!(policy.delay_for(3, "k"), Duration::from_millis(400));
		assert_eq!(policy.delay_for(5, "k"), Duration::from_millis(1_000));
	}

	#[test]
	fn jitter_is_bounded_and_deterministic() {
		let policy =
			RetryPolicy::new(3, Duration::from_millis(100), Duration::from_millis(10_000), 0.5);
		let first = policy.delay_for(1, "question");

		assert_eq!(first, policy.delay_for(1, "question"));
		assert!(first >= Duration::from_millis(100));
		assert!(first <= Duration::from_millis(150));
	}
}
