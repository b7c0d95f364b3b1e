use std::collections::BTreeSet;

use serde::Serialize;
use time::{Date, Duration, Month};

use crate::Endpoint;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
	InvalidMonth { month: u8 },
	InvalidYear { year: i32 },
	InvertedRange { start: Date, end: Date },
}
impl std::fmt::Display for CalendarError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::InvalidMonth { month } => write!(f, "Month {month} is not in 1..=12."),
			Self::InvalidYear { year } => write!(f, "Year {year} is out of range."),
			Self::InvertedRange { start, end } => {
				write!(f, "Start date {start} is after end date {end}.")
			},
		}
	}
}
impl std::error::Error for CalendarError {}

/// Inclusive run of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
	#[serde(with = "crate::time_serde")]
	pub start: Date,
	#[serde(with = "crate::time_serde")]
	pub end: Date,
}
impl DateRange {
	pub fn new(start: Date, end: Date) -> Result<Self, CalendarError> {
		if start > end {
			return Err(CalendarError::InvertedRange { start, end });
		}

		Ok(Self { start, end })
	}

	pub fn days(&self) -> u32 {
		((self.end - self.start).whole_days() + 1) as u32
	}

	pub fn dates(&self) -> impl Iterator<Item = Date> + use<> {
		dates_between(self.start, self.end)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyProgress {
	pub endpoint: Endpoint,
	pub year: i32,
	pub month: u8,
	pub synced_days: u32,
	pub raw_days: u32,
	pub total_days: u32,
	pub missing_ranges: Vec<DateRange>,
	pub is_complete: bool,
}

pub fn month_from_number(month: u8) -> Result<Month, CalendarError> {
	Month::try_from(month).map_err(|_| CalendarError::InvalidMonth { month })
}

pub fn month_bounds(year: i32, month: u8) -> Result<DateRange, CalendarError> {
	let month_value = month_from_number(month)?;
	let start = Date::from_calendar_date(year, month_value, 1)
		.map_err(|_| CalendarError::InvalidYear { year })?;
	let next_start = match month_value {
		Month::December => Date::from_calendar_date(year + 1, Month::January, 1),
		other => Date::from_calendar_date(year, other.next(), 1),
	}
	.map_err(|_| CalendarError::InvalidYear { year })?;
	let end = next_start.previous_day().ok_or(CalendarError::InvalidYear { year })?;

	Ok(DateRange { start, end })
}

/// Dates a month is expected to cover: the whole month in the past, up to and including `today`
/// in the current month, nothing in the future.
pub fn expected_range(year: i32, month: u8, today: Date) -> Result<Option<DateRange>, CalendarError> {
	let bounds = month_bounds(year, month)?;

	if bounds.start > today {
		return Ok(None);
	}

	Ok(Some(DateRange { start: bounds.start, end: bounds.end.min(today) }))
}

pub fn dates_between(start: Date, end: Date) -> impl Iterator<Item = Date> {
	let mut next = (start <= end).then_some(start);

	std::iter::from_fn(move || {
		let current = next?;

		next = current.next_day().filter(|day| *day <= end);

		Some(current)
	})
}

/// Maximal runs of dates in `expected` that are absent from `present`.
pub fn missing_ranges(expected: DateRange, present: &BTreeSet<Date>) -> Vec<DateRange> {
	let mut ranges = Vec::new();
	let mut open: Option<DateRange> = None;

	for date in expected.dates() {
		if present.contains(&date) {
			if let Some(range) = open.take() {
				ranges.push(range);
			}

			continue;
		}

		match open.as_mut() {
			Some(range) => range.end = date,
			None => open = Some(DateRange { start: date, end: date }),
		}
	}

	if let Some(range) = open {
		ranges.push(range);
	}

	ranges
}

pub fn monthly_progress(
	endpoint: Endpoint,
	year: i32,
	month: u8,
	today: Date,
	raw_dates: &BTreeSet<Date>,
	processed_dates: &BTreeSet<Date>,
) -> Result<MonthlyProgress, CalendarError> {
	let Some(expected) = expected_range(year, month, today)? else {
		return Ok(MonthlyProgress {
			endpoint,
			year,
			month,
			synced_days: 0,
			raw_days: 0,
			total_days: 0,
			missing_ranges: Vec::new(),
			is_complete: false,
		});
	};
	let in_scope = |dates: &BTreeSet<Date>| {
		dates.range(expected.start..=expected.end).count() as u32
	};
	let missing = missing_ranges(expected, processed_dates);

	Ok(MonthlyProgress {
		endpoint,
		year,
		month,
		synced_days: in_scope(processed_dates),
		raw_days: in_scope(raw_dates),
		total_days: expected.days(),
		is_complete: missing.is_empty(),
		missing_ranges: missing,
	})
}

/// Splits `[start, end]` into consecutive chunks of at most `max_days`.
pub fn chunk_range(range: DateRange, max_days: u32) -> Vec<DateRange> {
	let step = i64::from(max_days.max(1));
	let mut chunks = Vec::new();
	let mut start = range.start;

	while start <= range.end {
		let end = (start + Duration::days(step - 1)).min(range.end);

		chunks.push(DateRange { start, end });

		match end.next_day() {
			Some(next) => start = next,
			None => break,
		}
	}

	chunks
}

#[cfg(test)]
mod tests {
	use time::macros::date;

	use super::*;

	#[test]
	fn expected_range_clamps_current_month_to_today() {
		let today = date!(2024 - 02 - 10);

		assert_eq!(
			expected_range(2024, 2, today).expect("valid month"),
			Some(DateRange { start: date!(2024 - 02 - 01), end: today })
		);
		assert_eq!(expected_range(2024, 3, today).expect("valid month"), None);
		assert_eq!(
			expected_range(2024, 1, today).expect("valid month").map(|range| range.days()),
			Some(31)
		);
	}

	#[test]
	fn leap_february_has_twenty_nine_days() {
		assert_eq!(month_bounds(2024, 2).expect("valid month").days(), 29);
		assert_eq!(month_bounds(2023, 2).expect("valid month").days(), 28);
		assert!(month_bounds(2024, 13).is_err());
	}

	#[test]
	fn chunks_cover_the_range_without_overlap() {
		let range = DateRange { start: date!(2024 - 01 - 30), end: date!(2024 - 02 - 04) };
		let chunks = chunk_range(range, 2);

		assert_eq!(chunks.len(), 3);
		assert_eq!(chunks[0], DateRange { start: date!(2024 - 01 - 30), end: date!(2024 - 01 - 31) });
		assert_eq!(chunks[2], DateRange { start: date!(2024 - 02 - 03), end: date!(2024 - 02 - 04) });
	}

	#[test]
	fn inverted_range_is_rejected() {
		assert!(DateRange::new(date!(2024 - 01 - 02), date!(2024 - 01 - 01)).is_err());
	}
}
