//! Progress Tracker.
//!
//! Read-only view over the raw and processed stores. Answers are cached per query for a short
//! while; writers invalidate the entries of the endpoint they touched.

use std::{
	collections::HashMap,
	sync::Mutex,
	time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, HorecaService, Result};
use horeca_domain::{
	Endpoint,
	calendar::{self, DateRange, MonthlyProgress},
};
use horeca_storage::{processed, raw};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressAction {
	#[default]
	Monthly,
	All,
	Missing,
	Summary,
	CheckDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct ProgressQuery {
	#[serde(default)]
	pub endpoint: Option<Endpoint>,
	#[serde(default)]
	pub year: Option<i32>,
	#[serde(default)]
	pub month: Option<u8>,
	#[serde(default)]
	pub action: ProgressAction,
	#[serde(default, with = "horeca_domain::time_serde::option")]
	pub date: Option<Date>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ProgressResponse {
	Monthly(MonthlyProgress),
	All(AllEndpoints),
	Missing(MissingDays),
	Summary(YearSummary),
	CheckDate(DateCheck),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllEndpoints {
	pub year: i32,
	pub month: u8,
	pub endpoints: Vec<MonthlyProgress>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingDays {
	pub endpoint: Endpoint,
	pub year: i32,
	pub month: u8,
	pub missing_days: u32,
	pub missing_ranges: Vec<DateRange>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSummary {
	pub endpoint: Endpoint,
	pub year: i32,
	pub complete_months: u32,
	pub months: Vec<MonthlyProgress>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateCheck {
	#[serde(with = "horeca_domain::time_serde")]
	pub date: Date,
	pub endpoints: Vec<DatePresence>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatePresence {
	pub endpoint: Endpoint,
	pub has_raw: bool,
	pub has_processed: bool,
}

pub(crate) struct ProgressCache {
	ttl: Duration,
	entries: Mutex<HashMap<ProgressQuery, (Instant, ProgressResponse)>>,
}
impl ProgressCache {
	pub(crate) fn new(ttl_seconds: u64) -> Self {
		Self { ttl: Duration::from_secs(ttl_seconds), entries: Mutex::new(HashMap::new()) }
	}

	fn get(&self, query: &ProgressQuery) -> Option<ProgressResponse> {
		if self.ttl.is_zero() {
			return None;
		}

		let mut entries = self.entries.lock().ok()?;

		match entries.get(query) {
			Some((stored_at, response)) if stored_at.elapsed() < self.ttl => Some(response.clone()),
			Some(_) => {
				entries.remove(query);

				None
			},
			None => None,
		}
	}

	fn put(&self, query: ProgressQuery, response: ProgressResponse) {
		if self.ttl.is_zero() {
			return;
		}
		if let Ok(mut entries) = self.entries.lock() {
			entries.insert(query, (Instant::now(), response));
		}
	}

	/// Drops the entries of one endpoint together with the cross-endpoint ones.
	pub(crate) fn invalidate(&self, endpoint: Endpoint) {
		if let Ok(mut entries) = self.entries.lock() {
			entries.retain(|query, _| query.endpoint.is_some_and(|cached| cached != endpoint));
		}
	}
}

impl HorecaService {
	pub async fn progress(&self, query: ProgressQuery) -> Result<ProgressResponse> {
		let query = self.normalize_query(query)?;

		if let Some(cached) = self.progress_cache.get(&query) {
			return Ok(cached);
		}

		let response = self.compute_progress(&query).await?;

		self.progress_cache.put(query, response.clone());

		Ok(response)
	}

	/// Uncached progress of one endpoint and month.
	pub async fn monthly_progress(
		&self,
		endpoint: Endpoint,
		year: i32,
		month: u8,
	) -> Result<MonthlyProgress> {
		let bounds = calendar::month_bounds(year, month)?;

		self.progress_within(endpoint, bounds, &[month], year).await?.pop().ok_or_else(|| {
			Error::InvalidRequest { message: format!("No progress for {year}-{month:02}.") }
		})
	}

	fn normalize_query(&self, mut query: ProgressQuery) -> Result<ProgressQuery> {
		let today = self.today();

		match query.action {
			ProgressAction::CheckDate => {
				if query.date.is_none() {
					return Err(Error::InvalidRequest {
						message: "check-date requires a date.".to_string(),
					});
				}

				query.endpoint = None;
				query.year = None;
				query.month = None;
			},
			ProgressAction::All => {
				query.endpoint = None;
				query.date = None;
			},
			ProgressAction::Monthly | ProgressAction::Missing | ProgressAction::Summary => {
				if query.endpoint.is_none() {
					return Err(Error::InvalidRequest {
						message: "An endpoint is required for this action.".to_string(),
					});
				}

				query.date = None;
			},
		}

		if query.action != ProgressAction::CheckDate {
			query.year.get_or_insert(today.year());

			if query.action == ProgressAction::Summary {
				query.month = None;
			} else {
				let month = *query.month.get_or_insert(u8::from(today.month()));

				calendar::month_from_number(month)?;
			}
		}

		Ok(query)
	}

	async fn compute_progress(&self, query: &ProgressQuery) -> Result<ProgressResponse> {
		let year = query.year.unwrap_or_default();
		let month = query.month.unwrap_or(1);

		match (query.action, query.endpoint, query.date) {
			(ProgressAction::Monthly, Some(endpoint), _) =>
				Ok(ProgressResponse::Monthly(self.monthly_progress(endpoint, year, month).await?)),
			(ProgressAction::Missing, Some(endpoint), _) => {
				let progress = self.monthly_progress(endpoint, year, month).await?;
				let missing_days = progress.missing_ranges.iter().map(DateRange::days).sum();

				Ok(ProgressResponse::Missing(MissingDays {
					endpoint,
					year,
					month,
					missing_days,
					missing_ranges: progress.missing_ranges,
				}))
			},
			(ProgressAction::Summary, Some(endpoint), _) => {
				let start = calendar::month_bounds(year, 1)?.start;
				let end = calendar::month_bounds(year, 12)?.end;
				let months: Vec<u8> = (1..=12).collect();
				let months =
					self.progress_within(endpoint, DateRange { start, end }, &months, year).await?;
				let complete_months = months.iter().filter(|progress| progress.is_complete).count() as u32;

				Ok(ProgressResponse::Summary(YearSummary { endpoint, year, complete_months, months }))
			},
			(ProgressAction::All, _, _) => {
				let mut endpoints = Vec::with_capacity(Endpoint::ALL.len());

				for endpoint in Endpoint::ALL {
					endpoints.push(self.monthly_progress(endpoint, year, month).await?);
				}

				Ok(ProgressResponse::All(AllEndpoints { year, month, endpoints }))
			},
			(ProgressAction::CheckDate, _, Some(date)) => {
				let mut endpoints = Vec::with_capacity(Endpoint::ALL.len());
				let day = DateRange { start: date, end: date };

				for endpoint in Endpoint::ALL {
					let has_raw = raw::raw_exists(&self.db.pool, endpoint, date, None).await?;
					let has_processed =
						!processed::list_processed_dates(&self.db.pool, endpoint, day).await?.is_empty();

					endpoints.push(DatePresence { endpoint, has_raw, has_processed });
				}

				Ok(ProgressResponse::CheckDate(DateCheck { date, endpoints }))
			},
			_ => Err(Error::InvalidRequest { message: "Incomplete progress query.".to_string() }),
		}
	}

	/// Loads the date sets for `span` once and derives the progress of each listed month from them.
	async fn progress_within(
		&self,
		endpoint: Endpoint,
		span: DateRange,
		months: &[u8],
		year: i32,
	) -> Result<Vec<MonthlyProgress>> {
		let today = self.today();
		let raw_dates = raw::list_raw_dates(&self.db.pool, endpoint, span).await?;
		let processed_dates = processed::list_processed_dates(&self.db.pool, endpoint, span).await?;

		months
			.iter()
			.map(|month| {
				calendar::monthly_progress(endpoint, year, *month, today, &raw_dates, &processed_dates)
					.map_err(Error::from)
			})
			.collect()
	}
}
