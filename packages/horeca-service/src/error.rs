use horeca_domain::calendar::CalendarError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Configuration error: {message}")]
	Configuration { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<horeca_storage::Error> for Error {
	fn from(err: horeca_storage::Error) -> Self {
		match err {
			horeca_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			horeca_storage::Error::SerdeJson(inner) => Self::Storage { message: inner.to_string() },
			horeca_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			horeca_storage::Error::NotFound(message) => Self::NotFound { message },
		}
	}
}

impl From<horeca_providers::Error> for Error {
	fn from(err: horeca_providers::Error) -> Self {
		match err {
			horeca_providers::Error::InvalidConfig { message } => Self::Configuration { message },
			horeca_providers::Error::InvalidHeaderName(inner) =>
				Self::Configuration { message: inner.to_string() },
			horeca_providers::Error::InvalidHeaderValue(inner) =>
				Self::Configuration { message: inner.to_string() },
			other => Self::Provider { message: other.to_string() },
		}
	}
}

impl From<CalendarError> for Error {
	fn from(err: CalendarError) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}
