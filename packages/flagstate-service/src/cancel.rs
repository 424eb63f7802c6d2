use std::{
	pin::pin,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use tokio::{sync::Notify, time::Instant};

/// Cloneable, request-scoped cancellation signal. Every clone observes the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
	inner: Arc<TokenState>,
}
impl CancellationToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
			self.inner.notify.notify_waiters();
		}
	}

	pub fn is_cancelled(&self) -> bool {
		self.inner.cancelled.load(Ordering::SeqCst)
	}

	/// Resolves once `cancel` has been called on any clone.
	pub async fn cancelled(&self) {
		loop {
			let mut notified = pin!(self.inner.notify.notified());

			notified.as_mut().enable();

			if self.is_cancelled() {
				return;
			}

			notified.await;
		}
	}
}

#[derive(Debug, Default)]
struct TokenState {
	cancelled: AtomicBool,
	notify: Notify,
}

/// Optional wall-clock budget for one request.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Option<Instant>);
impl Deadline {
	pub fn after(timeout: Option<Duration>) -> Self {
		Self(timeout.map(|timeout| Instant::now() + timeout))
	}

	/// Resolves when the deadline passes; never resolves when unset.
	pub async fn elapsed(self) {
		match self.0 {
			Some(at) => tokio::time::sleep_until(at).await,
			None => std::future::pending::<()>().await,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn clones_share_cancellation() {
		let token = CancellationToken::new();
		let clone = token.clone();
		let waiter = tokio::spawn(async move { clone.cancelled().await });

		token.cancel();

		tokio::time::timeout(Duration::from_secs(1), waiter)
			.await
			.expect("Waiter did not observe cancellation.")
			.expect("Waiter task panicked.");

		assert!(token.is_cancelled());
	}

	#[tokio::test]
	async fn already_cancelled_token_resolves_immediately() {
		let token = CancellationToken::new();

		token.cancel();

		tokio::time::timeout(Duration::from_millis(100), token.cancelled())
			.await
			.expect("Expected immediate resolution.");
	}

	#[tokio::test]
	async fn deadline_elapses() {
		tokio::time::timeout(
			Duration::from_secs(1),
			Deadline::after(Some(Duration::from_millis(5))).elapsed(),
		)
		.await
		.expect("Deadline did not elapse.");
	}
}
