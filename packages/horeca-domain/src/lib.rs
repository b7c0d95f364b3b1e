pub mod calendar;
pub mod endpoint;
pub mod location_match;
pub mod payload;
pub mod pnl;
pub mod rollup;
pub mod time_serde;

pub use endpoint::{Endpoint, KeyShape, UnknownEndpoint, Vendor};
