pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_locations.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_locations.sql")),
				"tables/002_raw_records.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_raw_records.sql")),
				"tables/003_processed_records.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_processed_records.sql")),
				"tables/004_labor_day_aggregates.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_labor_day_aggregates.sql")),
				"tables/005_labor_team_day_aggregates.sql" => out
					.push_str(include_str!("../../../sql/tables/005_labor_team_day_aggregates.sql")),
				"tables/006_revenue_day_aggregates.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_revenue_day_aggregates.sql")),
				"tables/007_sales_day_aggregates.sql" =>
					out.push_str(include_str!("../../../sql/tables/007_sales_day_aggregates.sql")),
				"tables/008_sales_category_day_aggregates.sql" => out.push_str(include_str!(
					"../../../sql/tables/008_sales_category_day_aggregates.sql"
				)),
				"tables/009_pnl_ledger_entries.sql" =>
					out.push_str(include_str!("../../../sql/tables/009_pnl_ledger_entries.sql")),
				"tables/010_pnl_monthly_summaries.sql" =>
					out.push_str(include_str!("../../../sql/tables/010_pnl_monthly_summaries.sql")),
				"tables/011_sync_schedule_state.sql" =>
					out.push_str(include_str!("../../../sql/tables/011_sync_schedule_state.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
