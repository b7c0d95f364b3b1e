//! Eitje open API adapter.
//!
//! Eitje has no cursor: the safe unit of work is one calendar day per call, requested with
//! `start_date == end_date`. Responses are either a bare JSON array or an object wrapping one.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{
	Deserialize, Deserializer, Serialize, Serializer,
	de::Error as _,
	ser::SerializeMap as _,
};
use serde_json::Value;
use time::Date;

use crate::{Error, Page, Result, lenient};
use horeca_domain::{Endpoint, time_serde};

pub const PARTNER_USERNAME_HEADER: &str = "Partner-Username";
pub const PARTNER_PASSWORD_HEADER: &str = "Partner-Password";
pub const API_USERNAME_HEADER: &str = "Api-Username";
pub const API_PASSWORD_HEADER: &str = "Api-Password";
pub const ENVIRONMENTS_PATH: &str = "/open_api/environments";

const LIST_KEYS: [&str; 2] = ["items", "data"];

pub fn path_for(endpoint: Endpoint) -> Option<&'static str> {
	match endpoint {
		Endpoint::TimeRegistrationShifts => Some("/open_api/time_registration_shifts"),
		Endpoint::PlanningShifts => Some("/open_api/planning_shifts"),
		Endpoint::RevenueDays => Some("/open_api/revenue_days"),
		Endpoint::BorkTicketDay => None,
	}
}

pub fn auth_headers(cfg: &horeca_config::Eitje) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	for (name, value) in [
		(PARTNER_USERNAME_HEADER, &cfg.partner_username),
		(PARTNER_PASSWORD_HEADER, &cfg.partner_password),
		(API_USERNAME_HEADER, &cfg.api_username),
		(API_PASSWORD_HEADER, &cfg.api_password),
	] {
		if value.trim().is_empty() {
			return Err(Error::InvalidConfig {
				message: format!("Eitje credential {name} is empty."),
			});
		}

		let mut value = HeaderValue::from_str(value)?;

		value.set_sensitive(true);
		headers.insert(HeaderName::from_bytes(name.as_bytes())?, value);
	}

	Ok(headers)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EitjeEnvironment {
	#[serde(deserialize_with = "lenient::id")]
	pub id: i64,
	#[serde(default)]
	pub name: String,
}

/// Nested `environment` object some Eitje resources carry instead of `environment_id`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnvironmentRef {
	#[serde(default, deserialize_with = "lenient::opt_i64")]
	pub id: Option<i64>,
	#[serde(default, deserialize_with = "lenient::opt_string")]
	pub name: Option<String>,
}

/// A registered or planned shift. Serializes to the persisted field set only.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EitjeShift {
	#[serde(deserialize_with = "lenient::id")]
	pub id: i64,
	#[serde(
		default,
		deserialize_with = "lenient::opt_i64",
		skip_serializing_if = "Option::is_none"
	)]
	pub user_id: Option<i64>,
	#[serde(
		default,
		deserialize_with = "lenient::opt_i64",
		skip_serializing_if = "Option::is_none"
	)]
	pub team_id: Option<i64>,
	#[serde(
		default,
		alias = "start",
		alias = "starts_at",
		deserialize_with = "lenient::opt_string",
		skip_serializing_if = "Option::is_none"
	)]
	pub start_time: Option<String>,
	#[serde(
		default,
		alias = "end",
		alias = "ends_at",
		deserialize_with = "lenient::opt_string",
		skip_serializing_if = "Option::is_none"
	)]
	pub end_time: Option<String>,
	/// Minutes.
	#[serde(
		default,
		alias = "break_minutes",
		alias = "breaks",
		deserialize_with = "lenient::opt_f64",
		skip_serializing_if = "Option::is_none"
	)]
	pub break_duration: Option<f64>,
	#[serde(
		default,
		alias = "hours",
		deserialize_with = "lenient::opt_f64",
		skip_serializing_if = "Option::is_none"
	)]
	pub hours_worked: Option<f64>,
	#[serde(
		default,
		alias = "costs",
		alias = "wage_costs",
		deserialize_with = "lenient::opt_f64",
		skip_serializing_if = "Option::is_none"
	)]
	pub wage_cost: Option<f64>,
	#[serde(
		default,
		deserialize_with = "lenient::opt_bool",
		skip_serializing_if = "Option::is_none"
	)]
	pub approved: Option<bool>,
	#[serde(
		default,
		deserialize_with = "lenient::opt_date",
		serialize_with = "time_serde::option::serialize",
		skip_serializing_if = "Option::is_none"
	)]
	pub date: Option<Date>,
	#[serde(
		default,
		deserialize_with = "lenient::opt_string",
		skip_serializing_if = "Option::is_none"
	)]
	pub status: Option<String>,
	#[serde(default, deserialize_with = "lenient::opt_i64", skip_serializing)]
	pub environment_id: Option<i64>,
	#[serde(default, skip_serializing)]
	pub environment: Option<EnvironmentRef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EitjeRevenueDay {
	#[serde(deserialize_with = "lenient::id")]
	pub id: i64,
	#[serde(
		default,
		deserialize_with = "lenient::opt_date",
		serialize_with = "time_serde::option::serialize",
		skip_serializing_if = "Option::is_none"
	)]
	pub date: Option<Date>,
	#[serde(
		default,
		alias = "revenue",
		deserialize_with = "lenient::opt_f64",
		skip_serializing_if = "Option::is_none"
	)]
	pub total_revenue: Option<f64>,
	#[serde(
		default,
		deserialize_with = "lenient::opt_f64",
		skip_serializing_if = "Option::is_none"
	)]
	pub revenue_excl_vat: Option<f64>,
	#[serde(
		default,
		deserialize_with = "lenient::opt_f64",
		skip_serializing_if = "Option::is_none"
	)]
	pub revenue_incl_vat: Option<f64>,
	#[serde(
		default,
		deserialize_with = "lenient::opt_f64",
		skip_serializing_if = "Option::is_none"
	)]
	pub vat_amount: Option<f64>,
	#[serde(
		default,
		deserialize_with = "lenient::opt_i64",
		skip_serializing_if = "Option::is_none"
	)]
	pub transaction_count: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payment_methods: Option<PaymentBreakdown>,
	#[serde(
		default,
		deserialize_with = "lenient::opt_string",
		skip_serializing_if = "Option::is_none"
	)]
	pub currency: Option<String>,
	#[serde(default, deserialize_with = "lenient::opt_i64", skip_serializing)]
	pub environment_id: Option<i64>,
	#[serde(default, skip_serializing)]
	pub environment: Option<EnvironmentRef>,
}

/// Revenue per payment method. Eitje sends either `{"pin": 10.0}` or
/// `[{"method": "pin", "amount": 10.0}]`; both read into the same list and write back as a map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentBreakdown(pub Vec<(String, f64)>);
impl<'de> Deserialize<'de> for PaymentBreakdown {
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = Value::deserialize(deserializer)?;
		let mut out = Vec::new();

		match raw {
			Value::Null => {},
			Value::Object(map) =>
				for (method, amount) in map {
					if let Some(amount) = amount_of(&amount) {
						out.push((method, amount));
					}
				},
			Value::Array(items) =>
				for item in items {
					let method = ["method", "name", "payment_method", "type"]
						.iter()
						.find_map(|key| item.get(key).and_then(Value::as_str));
					let amount = ["amount", "total", "value"]
						.iter()
						.find_map(|key| item.get(key).and_then(amount_of));

					if let (Some(method), Some(amount)) = (method, amount) {
						out.push((method.to_string(), amount));
					}
				},
			other =>
				return Err(D::Error::custom(format!(
					"Expected payment methods as object or array, got {other}."
				))),
		}

		Ok(Self(out))
	}
}
impl Serialize for PaymentBreakdown {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut map = serializer.serialize_map(Some(self.0.len()))?;

		for (method, amount) in &self.0 {
			map.serialize_entry(method, amount)?;
		}

		map.end()
	}
}

/// Typed record of one of the three Eitje endpoints.
#[derive(Debug, Clone, PartialEq)]
pub enum EitjeRecord {
	Shift(EitjeShift),
	RevenueDay(EitjeRevenueDay),
}
impl EitjeRecord {
	pub fn external_id(&self) -> String {
		match self {
			Self::Shift(shift) => shift.id.to_string(),
			Self::RevenueDay(day) => day.id.to_string(),
		}
	}

	pub fn date(&self) -> Option<Date> {
		match self {
			Self::Shift(shift) => shift.date,
			Self::RevenueDay(day) => day.date,
		}
	}

	/// Persisted form. Location references travel next to the payload, not inside it.
	pub fn to_payload(&self) -> Result<Value> {
		let value = match self {
			Self::Shift(shift) => serde_json::to_value(shift),
			Self::RevenueDay(day) => serde_json::to_value(day),
		};

		value.map_err(|err| Error::Parse { message: format!("Failed to encode Eitje record: {err}") })
	}
}

pub async fn fetch_environments(cfg: &horeca_config::Eitje) -> Result<Vec<EitjeEnvironment>> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.base_url, ENVIRONMENTS_PATH);
	let body =
		crate::send_for_body(client.get(&url).headers(auth_headers(cfg)?), &url).await?;

	parse_environments(&body)
}

/// Fetches every record of `endpoint` for one calendar day.
pub async fn fetch_day(
	cfg: &horeca_config::Eitje,
	endpoint: Endpoint,
	day: Date,
) -> Result<Page<EitjeRecord>> {
	let path = path_for(endpoint).ok_or_else(|| Error::InvalidConfig {
		message: format!("Endpoint {endpoint} is not served by Eitje."),
	})?;
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.base_url, path);
	let day_param = time_serde::format_date(day);
	let request = client
		.get(&url)
		.headers(auth_headers(cfg)?)
		.query(&[("start_date", day_param.as_str()), ("end_date", day_param.as_str())]);
	let body = crate::send_for_body(request, &url).await?;

	parse_day(endpoint, day, &body)
}

pub fn parse_day(endpoint: Endpoint, day: Date, body: &str) -> Result<Page<EitjeRecord>> {
	let items = parse_list(body)?;
	let page = if endpoint == Endpoint::RevenueDays {
		let page = crate::parse_items::<EitjeRevenueDay>(items);

		Page {
			items: page
				.items
				.into_iter()
				.map(|mut revenue| {
					revenue.date.get_or_insert(day);

					EitjeRecord::RevenueDay(revenue)
				})
				.collect(),
			rejected: page.rejected,
		}
	} else {
		let page = crate::parse_items::<EitjeShift>(items);

		Page {
			items: page
				.items
				.into_iter()
				.map(|mut shift| {
					if shift.date.is_none() {
						shift.date = shift
							.start_time
							.as_deref()
							.and_then(lenient::date_prefix)
							.or(Some(day));
					}

					EitjeRecord::Shift(shift)
				})
				.collect(),
			rejected: page.rejected,
		}
	};

	Ok(page)
}

pub fn parse_environments(body: &str) -> Result<Vec<EitjeEnvironment>> {
	parse_list(body)?
		.into_iter()
		.map(|item| {
			serde_json::from_value(item).map_err(|err| Error::Parse {
				message: format!("Eitje environment has an unexpected shape: {err}"),
			})
		})
		.collect()
}

fn parse_list(body: &str) -> Result<Vec<Value>> {
	let json: Value = serde_json::from_str(body)
		.map_err(|err| Error::Parse { message: format!("Eitje response is not valid JSON: {err}") })?;

	match json {
		Value::Array(items) => Ok(items),
		Value::Object(mut map) => LIST_KEYS
			.iter()
			.find_map(|key| match map.remove(*key) {
				Some(Value::Array(items)) => Some(items),
				_ => None,
			})
			.ok_or_else(|| Error::Parse {
				message: "Eitje response object has no items array.".to_string(),
			}),
		other => Err(Error::Parse {
			message: format!("Eitje response must be an array, got {}.", kind_of(&other)),
		}),
	}
}

fn amount_of(value: &Value) -> Option<f64> {
	match value {
		Value::Number(number) => number.as_f64(),
		Value::String(raw) => raw.trim().replace(',', ".").parse().ok(),
		_ => None,
	}
}

fn kind_of(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}
