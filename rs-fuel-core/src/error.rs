use thiserror::Error;

/// Errors raised by datasets and streams.
///
/// `EndOfData` is not a failure: it is the signal a consumer loop uses to
/// stop pulling. Every other variant surfaces immediately, nothing is retried.
#[derive(Error, Debug)]
pub enum StreamError {
	/// Invalid construction-time parameters. Always raised eagerly.
	#[error("configuration error: {0}")]
	Configuration(String),

	/// The caller broke the request contract of a component.
	#[error("invalid request: {0}")]
	InvalidRequest(String),

	/// No more data could be produced.
	#[error("end of data")]
	EndOfData,

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] postcard::Error),
}

impl StreamError {
	/// Returns `true` for the expected end-of-iteration signal.
	pub fn is_end_of_data(&self) -> bool {
		matches!(self, StreamError::EndOfData)
	}
}

pub type Result<T> = std::result::Result<T, StreamError>;
