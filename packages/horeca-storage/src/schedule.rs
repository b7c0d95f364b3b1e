use sqlx::PgExecutor;
use time::OffsetDateTime;

use crate::{Result, models::ScheduleState};

#[derive(Debug, Clone)]
pub struct ScheduleRun<'a> {
	pub endpoint: &'a str,
	pub last_run_at: OffsetDateTime,
	pub next_run_at: OffsetDateTime,
	pub status: &'a str,
	pub error: Option<&'a str>,
}

pub async fn record_run<'e, E>(executor: E, run: &ScheduleRun<'_>) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO sync_schedule_state (
	endpoint,
	last_run_at,
	next_run_at,
	last_status,
	last_error,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $2)
ON CONFLICT (endpoint) DO UPDATE
SET
	last_run_at = EXCLUDED.last_run_at,
	next_run_at = EXCLUDED.next_run_at,
	last_status = EXCLUDED.last_status,
	last_error = EXCLUDED.last_error,
	updated_at = EXCLUDED.updated_at",
	)
	.bind(run.endpoint)
	.bind(run.last_run_at)
	.bind(run.next_run_at)
	.bind(run.status)
	.bind(run.error)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn get_state<'e, E>(executor: E, endpoint: &str) -> Result<Option<ScheduleState>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, ScheduleState>(
		"\
SELECT endpoint, last_run_at, next_run_at, last_status, last_error, updated_at
FROM sync_schedule_state
WHERE endpoint = $1",
	)
	.bind(endpoint)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}
