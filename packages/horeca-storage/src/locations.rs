//! Canonical locations, mirrored from configuration.

use sqlx::{PgConnection, PgExecutor};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Result, models::LocationRow};

/// Stable id derived from the case-folded name, so renames in config casing keep the same row.
pub fn location_id_for(name: &str) -> Uuid {
	let key = format!("location:{}", name.trim().to_lowercase());

	Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

pub async fn sync_locations(
	conn: &mut PgConnection,
	locations: &[horeca_config::Location],
	now: OffsetDateTime,
) -> Result<Vec<LocationRow>> {
	let mut rows = Vec::with_capacity(locations.len());

	for location in locations {
		let row = LocationRow {
			location_id: location_id_for(&location.name),
			name: location.name.trim().to_string(),
			eitje_environment_ids: location.eitje_environment_ids.clone(),
			has_bork: location.bork.is_some(),
		};

		upsert_location(&mut *conn, &row, now).await?;

		rows.push(row);
	}

	Ok(rows)
}

pub async fn upsert_location<'e, E>(executor: E, row: &LocationRow, now: OffsetDateTime) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO locations (location_id, name, eitje_environment_ids, has_bork, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $5)
ON CONFLICT (location_id) DO UPDATE
SET
	name = EXCLUDED.name,
	eitje_environment_ids = EXCLUDED.eitje_environment_ids,
	has_bork = EXCLUDED.has_bork,
	updated_at = EXCLUDED.updated_at
WHERE (locations.name, locations.eitje_environment_ids, locations.has_bork)
	IS DISTINCT FROM (EXCLUDED.name, EXCLUDED.eitje_environment_ids, EXCLUDED.has_bork)",
	)
	.bind(row.location_id)
	.bind(row.name.as_str())
	.bind(&row.eitje_environment_ids)
	.bind(row.has_bork)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn list_locations<'e, E>(executor: E) -> Result<Vec<LocationRow>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, LocationRow>(
		"\
SELECT location_id, name, eitje_environment_ids, has_bork
FROM locations
ORDER BY name",
	)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn get_location<'e, E>(executor: E, location_id: Uuid) -> Result<Option<LocationRow>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, LocationRow>(
		"\
SELECT location_id, name, eitje_environment_ids, has_bork
FROM locations
WHERE location_id = $1",
	)
	.bind(location_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}
