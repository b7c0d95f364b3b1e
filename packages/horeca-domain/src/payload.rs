//! Storage-size control for raw vendor payloads.
//!
//! Raw records keep only the fields listed here. Anything else the vendor sends is dropped before
//! persistence, including nested objects that are not on the list.

use serde_json::{Map, Value};

use crate::Endpoint;

pub const TIME_REGISTRATION_SHIFT_FIELDS: &[&str] = &[
	"id",
	"user_id",
	"team_id",
	"start_time",
	"end_time",
	"break_duration",
	"hours_worked",
	"wage_cost",
	"approved",
	"date",
];

pub const PLANNING_SHIFT_FIELDS: &[&str] = &[
	"id",
	"user_id",
	"team_id",
	"start_time",
	"end_time",
	"break_duration",
	"hours_worked",
	"wage_cost",
	"date",
	"status",
];

pub const REVENUE_DAY_FIELDS: &[&str] = &[
	"id",
	"date",
	"total_revenue",
	"revenue_excl_vat",
	"revenue_incl_vat",
	"vat_amount",
	"transaction_count",
	"payment_methods",
	"currency",
];

/// Ticket-level half of the Bork allow-list.
pub const BORK_TICKET_FIELDS: &[&str] =
	&["ActualDate", "TicketNumber", "PaymentMethod", "TableNumber", "WaiterName"];

/// Line-level half of the Bork allow-list.
pub const BORK_LINE_FIELDS: &[&str] = &[
	"ProductName",
	"ProductSku",
	"Category",
	"Quantity",
	"Price",
	"TotalPrice",
	"RevenueExVat",
	"RevenueIncVat",
	"VatRate",
	"VatAmount",
	"CostPrice",
];

pub const BORK_TICKETS_KEY: &str = "Tickets";
pub const BORK_LINES_KEY: &str = "Lines";

pub fn essential_fields(endpoint: Endpoint) -> &'static [&'static str] {
	match endpoint {
		Endpoint::TimeRegistrationShifts => TIME_REGISTRATION_SHIFT_FIELDS,
		Endpoint::PlanningShifts => PLANNING_SHIFT_FIELDS,
		Endpoint::RevenueDays => REVENUE_DAY_FIELDS,
		Endpoint::BorkTicketDay => BORK_TICKET_FIELDS,
	}
}

/// Reduces a payload to the endpoint's allow-list.
///
/// Eitje payloads are flat objects. A Bork ticket-day payload is `{"Tickets": [ticket...]}` where
/// each ticket carries a `Lines` array; tickets and lines are trimmed against their own lists.
/// Non-object input trims to an empty object.
pub fn trim_payload(endpoint: Endpoint, payload: &Value) -> Value {
	match endpoint {
		Endpoint::BorkTicketDay => trim_ticket_day(payload),
		_ => Value::Object(retain_fields(payload, essential_fields(endpoint))),
	}
}

fn trim_ticket_day(payload: &Value) -> Value {
	let tickets = payload
		.get(BORK_TICKETS_KEY)
		.and_then(Value::as_array)
		.map(|tickets| tickets.iter().map(trim_ticket).collect::<Vec<_>>())
		.unwrap_or_default();
	let mut out = Map::new();

	out.insert(BORK_TICKETS_KEY.to_string(), Value::Array(tickets));

	Value::Object(out)
}

fn trim_ticket(ticket: &Value) -> Value {
	let mut out = retain_fields(ticket, BORK_TICKET_FIELDS);
	let lines = ticket
		.get(BORK_LINES_KEY)
		.and_then(Value::as_array)
		.map(|lines| {
			lines
				.iter()
				.map(|line| Value::Object(retain_fields(line, BORK_LINE_FIELDS)))
				.collect::<Vec<_>>()
		})
		.unwrap_or_default();

	out.insert(BORK_LINES_KEY.to_string(), Value::Array(lines));

	Value::Object(out)
}

fn retain_fields(value: &Value, allowed: &[&str]) -> Map<String, Value> {
	let Some(object) = value.as_object() else {
		return Map::new();
	};

	object
		.iter()
		.filter(|(key, _)| allowed.contains(&key.as_str()))
		.map(|(key, value)| (key.clone(), value.clone()))
		.collect()
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn shift_payload_drops_unlisted_fields() {
		let raw = json!({
			"id": 7,
			"user_id": 3,
			"hours_worked": 7.5,
			"environment": { "id": 12, "name": "Bar Bea" },
			"remarks": "late arrival",
		});
		let trimmed = trim_payload(Endpoint::TimeRegistrationShifts, &raw);

		assert_eq!(trimmed, json!({ "id": 7, "user_id": 3, "hours_worked": 7.5 }));
	}

	#[test]
	fn ticket_day_trims_tickets_and_lines_separately() {
		let raw = json!({
			"Tickets": [{
				"TicketNumber": 42,
				"ActualDate": 20240105,
				"Guid": "abc",
				"Lines": [{
					"ProductName": "Pils",
					"Quantity": 2,
					"Printer": "bar",
					"TicketNumber": 42,
				}],
			}],
			"Meta": { "server": "x" },
		});
		let trimmed = trim_payload(Endpoint::BorkTicketDay, &raw);

		assert_eq!(
			trimmed,
			json!({
				"Tickets": [{
					"TicketNumber": 42,
					"ActualDate": 20240105,
					"Lines": [{ "ProductName": "Pils", "Quantity": 2 }],
				}],
			})
		);
	}

	#[test]
	fn non_object_payload_trims_to_empty_object() {
		assert_eq!(trim_payload(Endpoint::RevenueDays, &json!([1, 2])), json!({}));
		assert_eq!(trim_payload(Endpoint::BorkTicketDay, &json!("")), json!({ "Tickets": [] }));
	}
}
