//! Bounded exponential backoff shared by every vendor call.

use std::{future::Future, time::Duration};

const MAX_BACKOFF_EXPONENT: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
}
impl RetryPolicy {
	pub fn from_config(cfg: &horeca_config::Sync) -> Self {
		Self {
			max_attempts: cfg.max_attempts.max(1),
			base_delay: Duration::from_millis(cfg.base_backoff_ms),
			max_delay: Duration::from_millis(cfg.max_backoff_ms),
		}
	}

	/// Delay before retrying after the `attempt`-th failure (1-based).
	pub fn delay_after(&self, attempt: u32) -> Duration {
		let exp = attempt.max(1).saturating_sub(1).min(MAX_BACKOFF_EXPONENT);

		self.base_delay.saturating_mul(1 << exp).min(self.max_delay)
	}
}

#[derive(Debug)]
pub struct Attempted<T, E> {
	pub result: Result<T, E>,
	pub attempts: u32,
}

/// Runs `op` until it succeeds, fails with an error `is_retryable` rejects, or the policy runs out
/// of attempts.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
	policy: RetryPolicy,
	is_retryable: R,
	mut op: F,
) -> Attempted<T, E>
where
	F: FnMut(u32) -> Fut,
	Fut: Future<Output = Result<T, E>>,
	R: Fn(&E) -> bool,
	E: std::fmt::Display,
{
	let max_attempts = policy.max_attempts.max(1);
	let mut attempt = 1;

	loop {
		match op(attempt).await {
			Ok(value) => return Attempted { result: Ok(value), attempts: attempt },
			Err(err) if attempt < max_attempts && is_retryable(&err) => {
				let delay = policy.delay_after(attempt);

				tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Retrying vendor call.");
				tokio::time::sleep(delay).await;

				attempt += 1;
			},
			Err(err) => return Attempted { result: Err(err), attempts: attempt },
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicU32, Ordering};

	use super::*;

	fn instant_policy(max_attempts: u32) -> RetryPolicy {
		RetryPolicy { max_attempts, base_delay: Duration::ZERO, max_delay: Duration::ZERO }
	}

	#[test]
	fn delays_double_until_capped() {
		let policy = RetryPolicy {
			max_attempts: 10,
			base_delay: Duration::from_millis(500),
			max_delay: Duration::from_millis(3_000),
		};

		assert_eq!(policy.delay_after(1), Duration::from_millis(500));
		assert_eq!(policy.delay_after(2), Duration::from_millis(1_000));
		assert_eq!(policy.delay_after(3), Duration::from_millis(2_000));
		assert_eq!(policy.delay_after(4), Duration::from_millis(3_000));
		assert_eq!(policy.delay_after(40), Duration::from_millis(3_000));
	}

	#[tokio::test]
	async fn transient_failures_are_retried_until_success() {
		let calls = AtomicU32::new(0);
		let outcome = retry_with_backoff(
			instant_policy(3),
			|_: &String| true,
			|attempt| {
				calls.fetch_add(1, Ordering::SeqCst);

				async move { if attempt < 3 { Err("busy".to_string()) } else { Ok(attempt) } }
			},
		)
		.await;

		assert_eq!(outcome.result, Ok(3));
		assert_eq!(outcome.attempts, 3);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn permanent_failures_stop_immediately() {
		let outcome: Attempted<(), String> = retry_with_backoff(
			instant_policy(5),
			|err: &String| err != "unauthorized",
			|_| async { Err("unauthorized".to_string()) },
		)
		.await;

		assert_eq!(outcome.attempts, 1);
		assert!(outcome.result.is_err());
	}

	#[tokio::test]
	async fn exhausted_attempts_return_the_last_error() {
		let outcome: Attempted<(), String> =
			retry_with_backoff(instant_policy(4), |_: &String| true, |attempt| async move {
				Err(format!("timeout #{attempt}"))
			})
			.await;

		assert_eq!(outcome.attempts, 4);
		assert_eq!(outcome.result, Err("timeout #4".to_string()));
	}
}
