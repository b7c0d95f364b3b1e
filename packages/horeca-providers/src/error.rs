pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Adapter failures. None of these are retried here; callers decide with [`Error::is_transient`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Upstream returned HTTP {status}: {body}")]
	Upstream { status: u16, body: String },
	#[error("Request to {url} timed out.")]
	Timeout { url: String },
	#[error("{message}")]
	Parse { message: String },
	#[error("Request to {url} failed: {source}")]
	Transport { url: String, source: reqwest::Error },
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
}
impl Error {
	/// Drops the query string and reqwest's own copy of the URL; Bork carries its key in `appid`.
	pub(crate) fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
		let url = without_query(url).to_string();

		if err.is_timeout() {
			return Self::Timeout { url };
		}

		Self::Transport { url, source: err.without_url() }
	}

	/// Timeouts, connection failures, 429 and 5xx responses.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Timeout { .. } => true,
			Self::Transport { source, .. } =>
				source.is_connect() || source.is_request() || source.is_body(),
			Self::Upstream { status, .. } => *status == 429 || *status >= 500,
			_ => false,
		}
	}

	pub fn kind(&self) -> &'static str {
		match self {
			Self::Upstream { .. } => "upstream",
			Self::Timeout { .. } => "timeout",
			Self::Parse { .. } => "parse",
			Self::Transport { .. } => "transport",
			Self::InvalidHeaderName(_) | Self::InvalidHeaderValue(_) | Self::InvalidConfig { .. } =>
				"configuration",
		}
	}
}

fn without_query(url: &str) -> &str {
	url.split(['?', '#']).next().unwrap_or(url)
}
