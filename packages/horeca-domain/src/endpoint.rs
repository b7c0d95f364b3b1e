use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
	TimeRegistrationShifts,
	PlanningShifts,
	RevenueDays,
	BorkTicketDay,
}
impl Endpoint {
	pub const ALL: [Endpoint; 4] = [
		Endpoint::TimeRegistrationShifts,
		Endpoint::PlanningShifts,
		Endpoint::RevenueDays,
		Endpoint::BorkTicketDay,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::TimeRegistrationShifts => "time_registration_shifts",
			Self::PlanningShifts => "planning_shifts",
			Self::RevenueDays => "revenue_days",
			Self::BorkTicketDay => "bork_ticket_day",
		}
	}

	pub fn vendor(self) -> Vendor {
		match self {
			Self::TimeRegistrationShifts | Self::PlanningShifts | Self::RevenueDays => Vendor::Eitje,
			Self::BorkTicketDay => Vendor::Bork,
		}
	}

	/// How raw records of this endpoint are keyed in the raw store.
	pub fn key_shape(self) -> KeyShape {
		match self {
			Self::BorkTicketDay => KeyShape::DateLocation,
			_ => KeyShape::ExternalId,
		}
	}
}
impl fmt::Display for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Endpoint {
	type Err = UnknownEndpoint;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");

		match normalized.as_str() {
			"time_registration_shifts" => Ok(Self::TimeRegistrationShifts),
			"planning_shifts" => Ok(Self::PlanningShifts),
			"revenue_days" => Ok(Self::RevenueDays),
			"bork_ticket_day" | "bork_tickets" => Ok(Self::BorkTicketDay),
			_ => Err(UnknownEndpoint(raw.to_string())),
		}
	}
}

/// Bodies and query strings accept the same spellings as URL paths.
impl<'de> Deserialize<'de> for Endpoint {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		raw.parse().map_err(serde::de::Error::custom)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
	Eitje,
	Bork,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyShape {
	/// Shift and revenue-day records carry a vendor id.
	ExternalId,
	/// Ticket-day payloads are one blob per venue per calendar day.
	DateLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEndpoint(pub String);
impl fmt::Display for UnknownEndpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Unknown endpoint {:?}.", self.0)
	}
}
impl std::error::Error for UnknownEndpoint {}
