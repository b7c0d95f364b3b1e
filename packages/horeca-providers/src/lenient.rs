//! Deserializers for vendor fields that arrive as numbers on one day and strings on the next.

use serde::{Deserialize, Deserializer, de::Error as _};
use serde_json::Value;
use time::Date;

pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<Value>::deserialize(deserializer)? {
		None | Some(Value::Null) => Ok(None),
		Some(Value::Number(number)) => Ok(number.as_f64()),
		Some(Value::String(raw)) => parse_decimal(&raw).map_err(D::Error::custom),
		Some(other) => Err(D::Error::custom(format!("Expected a number, got {other}."))),
	}
}

pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<Value>::deserialize(deserializer)? {
		None | Some(Value::Null) => Ok(None),
		Some(Value::Number(number)) => number
			.as_i64()
			.or_else(|| number.as_f64().filter(|value| value.fract() == 0.0).map(|value| value as i64))
			.map(Some)
			.ok_or_else(|| D::Error::custom(format!("Expected an integer, got {number}."))),
		Some(Value::String(raw)) if raw.trim().is_empty() => Ok(None),
		Some(Value::String(raw)) => raw
			.trim()
			.parse()
			.map(Some)
			.map_err(|_| D::Error::custom(format!("Expected an integer, got {raw:?}."))),
		Some(other) => Err(D::Error::custom(format!("Expected an integer, got {other}."))),
	}
}

pub fn id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
	D: Deserializer<'de>,
{
	opt_i64(deserializer)?.ok_or_else(|| D::Error::custom("Record id is missing."))
}

/// Strings and numbers both become strings; blanks become `None`.
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<Value>::deserialize(deserializer)? {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(raw)) => {
			let trimmed = raw.trim();

			Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
		},
		Some(Value::Number(number)) => Ok(Some(number.to_string())),
		Some(Value::Bool(flag)) => Ok(Some(flag.to_string())),
		Some(other) => Err(D::Error::custom(format!("Expected a scalar, got {other}."))),
	}
}

pub fn opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<Value>::deserialize(deserializer)? {
		None | Some(Value::Null) => Ok(None),
		Some(Value::Bool(flag)) => Ok(Some(flag)),
		Some(Value::Number(number)) => Ok(Some(number.as_i64().unwrap_or_default() != 0)),
		Some(Value::String(raw)) => match raw.trim().to_ascii_lowercase().as_str() {
			"" => Ok(None),
			"true" | "1" | "yes" => Ok(Some(true)),
			"false" | "0" | "no" => Ok(Some(false)),
			_ => Err(D::Error::custom(format!("Expected a boolean, got {raw:?}."))),
		},
		Some(other) => Err(D::Error::custom(format!("Expected a boolean, got {other}."))),
	}
}

/// Accepts `2024-01-05` and timestamps that start with a date.
pub fn opt_date<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
where
	D: Deserializer<'de>,
{
	let Some(raw) = opt_string(deserializer)? else {
		return Ok(None);
	};

	date_prefix(&raw)
		.ok_or_else(|| D::Error::custom(format!("Expected a date, got {raw:?}.")))
		.map(Some)
}

pub fn date_prefix(raw: &str) -> Option<Date> {
	let head = raw.trim().get(..10)?;

	horeca_domain::time_serde::parse_date(head).ok()
}

/// Accepts `12.50`, `12,50` and blanks.
fn parse_decimal(raw: &str) -> Result<Option<f64>, String> {
	let trimmed = raw.trim();

	if trimmed.is_empty() {
		return Ok(None);
	}

	trimmed
		.replace(',', ".")
		.parse()
		.map(Some)
		.map_err(|_| format!("Expected a decimal, got {raw:?}."))
}

#[cfg(test)]
mod tests {
	use serde::Deserialize;
	use serde_json::json;

	#[derive(Debug, Deserialize)]
	struct Fields {
		#[serde(default, deserialize_with = "super::opt_f64")]
		amount: Option<f64>,
		#[serde(default, deserialize_with = "super::opt_i64")]
		count: Option<i64>,
		#[serde(default, deserialize_with = "super::opt_string")]
		label: Option<String>,
	}

	#[test]
	fn accepts_strings_numbers_and_blanks() {
		let fields: Fields =
			serde_json::from_value(json!({ "amount": "12,50", "count": "3", "label": 42 }))
				.expect("Failed to parse fields.");

		assert_eq!(fields.amount, Some(12.5));
		assert_eq!(fields.count, Some(3));
		assert_eq!(fields.label.as_deref(), Some("42"));

		let blank: Fields = serde_json::from_value(json!({ "amount": "", "label": "  " }))
			.expect("Failed to parse fields.");

		assert_eq!(blank.amount, None);
		assert_eq!(blank.count, None);
		assert_eq!(blank.label, None);
	}
}
