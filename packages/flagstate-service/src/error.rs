pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Embedding error: {message}")]
	Embedding { message: String },
	#[error("Vector store error: {message}")]
	VectorStore { message: String },
	#[error("Cancelled: {message}")]
	Cancelled { message: String },
}
impl From<flagstate_storage::Error> for Error {
	fn from(err: flagstate_storage::Error) -> Self {
		use flagstate_storage::Error as StorageError;

		match err {
			StorageError::InvalidArgument(message) => Self::InvalidRequest { message },
			StorageError::Qdrant(inner) => Self::VectorStore { message: inner.to_string() },
		}
	}
}

impl From<flagstate_providers::Error> for Error {
	fn from(err: flagstate_providers::Error) -> Self {
		Self::Embedding { message: err.to_string() }
	}
}
