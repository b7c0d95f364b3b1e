//! Bork point-of-sale adapter.
//!
//! Every venue has its own base URL and `appid`. The only resource used is "all tickets of one
//! calendar day", so the unit of work is one (location, date) pair.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{Error, Page, Result, lenient};

const COMPACT_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year][month][day]");

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BorkTicket {
	#[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
	pub ticket_number: Option<String>,
	/// `YYYYMMDD`, as a number or a string depending on the venue's server version.
	#[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
	pub actual_date: Option<String>,
	#[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
	pub payment_method: Option<String>,
	#[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
	pub table_number: Option<String>,
	#[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
	pub waiter_name: Option<String>,
	#[serde(default)]
	pub lines: Vec<BorkTicketLine>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BorkTicketLine {
	#[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
	pub product_name: Option<String>,
	#[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
	pub product_sku: Option<String>,
	#[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
	pub category: Option<String>,
	#[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
	pub quantity: Option<f64>,
	#[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
	pub price: Option<f64>,
	#[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
	pub total_price: Option<f64>,
	#[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
	pub revenue_ex_vat: Option<f64>,
	#[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
	pub revenue_inc_vat: Option<f64>,
	#[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
	pub vat_rate: Option<f64>,
	#[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
	pub vat_amount: Option<f64>,
	#[serde(default, deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
	pub cost_price: Option<f64>,
}

pub fn ticket_day_url(location: &horeca_config::BorkLocation, day: Date) -> Result<String> {
	let compact = day.format(COMPACT_DATE).map_err(|err| Error::InvalidConfig {
		message: format!("Failed to format Bork date: {err}"),
	})?;

	Ok(format!("{}/ticket/day.json/{compact}", location.base_url))
}

/// Fetches every ticket of one venue for one calendar day.
///
/// Quiet days can come back as an empty body or a non-array value; both read as zero tickets.
/// Non-2xx statuses are still errors.
pub async fn fetch_ticket_day(
	cfg: &horeca_config::Bork,
	location: &horeca_config::BorkLocation,
	day: Date,
) -> Result<Page<BorkTicket>> {
	if location.base_url.trim().is_empty() || location.app_id.trim().is_empty() {
		return Err(Error::InvalidConfig {
			message: "Bork location requires base_url and app_id.".to_string(),
		});
	}

	let client = crate::client(cfg.timeout_ms)?;
	let url = ticket_day_url(location, day)?;
	let request = client.get(&url).query(&[
		("appid", location.app_id.as_str()),
		("IncOpen", "True"),
		("IncInternal", "True"),
	]);
	let body = crate::send_for_body(request, &url).await?;

	Ok(parse_ticket_day(&body))
}

pub fn parse_ticket_day(body: &str) -> Page<BorkTicket> {
	match serde_json::from_str::<Value>(body) {
		Ok(Value::Array(items)) => crate::parse_items(items),
		_ => Page::empty(),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use time::macros::date;

	use super::*;

	#[test]
	fn quiet_day_bodies_read_as_no_tickets() {
		for body in ["", "null", "{}", "\"closed\"", "<html></html>"] {
			let page = parse_ticket_day(body);

			assert!(page.items.is_empty(), "body {body:?} should read as empty");
			assert!(page.rejected.is_empty());
		}
	}

	#[test]
	fn parses_tickets_with_lines_and_mixed_scalars() {
		let body = json!([
			{
				"TicketNumber": 1001,
				"ActualDate": 20240105,
				"PaymentMethod": "PIN",
				"TableNumber": 4,
				"Lines": [
					{ "ProductName": "Pils", "Category": "Bier", "Quantity": 2, "RevenueIncVat": "7,00" },
					{ "ProductName": "Bitterballen", "Quantity": "1", "RevenueExVat": 6.42 },
				],
			},
			{ "TicketNumber": "1002", "ActualDate": "20240105", "Lines": [] },
		])
		.to_string();
		let page = parse_ticket_day(&body);

		assert_eq!(page.items.len(), 2);
		assert_eq!(page.items[0].ticket_number.as_deref(), Some("1001"));
		assert_eq!(page.items[0].actual_date.as_deref(), Some("20240105"));
		assert_eq!(page.items[0].lines[0].revenue_inc_vat, Some(7.0));
		assert_eq!(page.items[0].lines[1].quantity, Some(1.0));
		assert_eq!(page.items[1].actual_date.as_deref(), Some("20240105"));
	}

	#[test]
	fn builds_ticket_day_url() {
		let location = horeca_config::BorkLocation {
			base_url: "https://bea.bork.example".to_string(),
			app_id: "key".to_string(),
		};

		assert_eq!(
			ticket_day_url(&location, date!(2024 - 03 - 09)).expect("Failed to build URL."),
			"https://bea.bork.example/ticket/day.json/20240309"
		);
	}
}
