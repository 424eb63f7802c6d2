pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("Provider returned HTTP {status}: {body}")]
	Status { status: u16, body: String },
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
}
impl Error {
	/// Transport timeouts, refused connections, throttling, and server-side failures are worth
	/// another attempt; everything else is returned immediately.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Reqwest(err) =>
				err.is_timeout()
					|| err.is_connect()
					|| err.status().is_some_and(|status| status_is_retryable(status.as_u16())),
			Self::Status { status, .. } => status_is_retryable(*status),
			_ => false,
		}
	}
}

fn status_is_retryable(status: u16) -> bool {
	status == 429 || (500..=599).contains(&status)
}
