//! HTTP adapters for the workforce (Eitje) and point-of-sale (Bork) vendors.
//!
//! Adapters are stateless: each call builds its own client with the configured timeout, sends one
//! request, and parses the body into typed records. Retrying is the caller's job.

pub mod bork;
pub mod eitje;

mod error;
mod lenient;

pub use error::{Error, Result};

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Records parsed from one vendor response, plus the ones that did not fit the expected shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
	pub items: Vec<T>,
	pub rejected: Vec<Rejected>,
}
impl<T> Page<T> {
	pub fn empty() -> Self {
		Self { items: Vec::new(), rejected: Vec::new() }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejected {
	pub index: usize,
	pub message: String,
}

pub(crate) fn client(timeout_ms: u64) -> Result<Client> {
	Client::builder()
		.timeout(Duration::from_millis(timeout_ms))
		.build()
		.map_err(|err| Error::InvalidConfig { message: format!("HTTP client setup failed: {err}") })
}

/// Sends the request and returns the body of a 2xx response.
pub(crate) async fn send_for_body(request: RequestBuilder, url: &str) -> Result<String> {
	let res = request.send().await.map_err(|err| Error::from_reqwest(err, url))?;
	let status = res.status();
	let body = res.text().await.map_err(|err| Error::from_reqwest(err, url))?;

	if !status.is_success() {
		return Err(Error::Upstream { status: status.as_u16(), body: truncate(&body) });
	}

	Ok(body)
}

/// Converts each element separately so one odd record does not sink the page.
pub(crate) fn parse_items<T>(items: Vec<Value>) -> Page<T>
where
	T: DeserializeOwned,
{
	let mut page = Page::empty();

	for (index, item) in items.into_iter().enumerate() {
		match serde_json::from_value(item) {
			Ok(parsed) => page.items.push(parsed),
			Err(err) => page.rejected.push(Rejected { index, message: err.to_string() }),
		}
	}

	page
}

fn truncate(body: &str) -> String {
	let trimmed = body.trim();

	match trimmed.char_indices().nth(MAX_ERROR_BODY_CHARS) {
		Some((cut, _)) => format!("{}...", &trimmed[..cut]),
		None => trimmed.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use serde::Deserialize;
	use serde_json::json;

	use super::*;

	#[test]
	fn truncates_long_error_bodies() {
		let long = "x".repeat(MAX_ERROR_BODY_CHARS + 10);

		assert_eq!(truncate(&long).len(), MAX_ERROR_BODY_CHARS + 3);
		assert_eq!(truncate(" short "), "short");
	}

	#[test]
	fn bad_items_are_rejected_individually() {
		#[derive(Debug, Deserialize)]
		struct Item {
			#[allow(dead_code)]
			id: i64,
		}

		let page: Page<Item> = parse_items(vec![json!({ "id": 1 }), json!("x"), json!({ "id": 3 })]);

		assert_eq!(page.items.len(), 2);
		assert_eq!(page.rejected.len(), 1);
		assert_eq!(page.rejected[0].index, 1);
	}
}
