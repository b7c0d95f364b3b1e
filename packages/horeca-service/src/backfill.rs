use serde::Serialize;

use crate::{HorecaService, Result, SyncReport, SyncRequest};
use horeca_domain::{
	Endpoint,
	calendar::{self, DateRange},
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
	pub endpoint: Endpoint,
	pub year: i32,
	pub month: u8,
	/// Sync windows derived from the month's gaps.
	pub ranges: Vec<DateRange>,
	pub reports: Vec<SyncReport>,
}
impl BackfillReport {
	pub fn success(&self) -> bool {
		self.reports.iter().all(|report| report.success)
	}
}

impl HorecaService {
	/// Syncs every gap of the month through the regular sync entry point.
	pub async fn backfill_month(&self, endpoint: Endpoint, year: i32, month: u8) -> Result<BackfillReport> {
		let progress = self.monthly_progress(endpoint, year, month).await?;
		let ranges = plan_backfill(&progress.missing_ranges, self.cfg.sync.max_range_days);

		tracing::info!(
			endpoint = %endpoint,
			year,
			month,
			missing_ranges = progress.missing_ranges.len(),
			windows = ranges.len(),
			"Backfill planned."
		);

		let mut reports = Vec::with_capacity(ranges.len());

		for range in &ranges {
			let report = self
				.sync(endpoint, SyncRequest { start_date: range.start, end_date: range.end })
				.await?;

			reports.push(report);
		}

		Ok(BackfillReport { endpoint, year, month, ranges, reports })
	}
}

pub(crate) fn plan_backfill(missing: &[DateRange], max_range_days: u32) -> Vec<DateRange> {
	missing.iter().flat_map(|range| calendar::chunk_range(*range, max_range_days)).collect()
}
