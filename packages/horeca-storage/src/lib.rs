pub mod aggregated;
pub mod db;
pub mod locations;
pub mod models;
pub mod pnl;
pub mod processed;
pub mod raw;
pub mod schedule;
pub mod schema;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
