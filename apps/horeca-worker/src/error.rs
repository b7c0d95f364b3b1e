pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0}")]
	Validation(String),
	#[error(transparent)]
	Storage(#[from] horeca_storage::Error),
	#[error(transparent)]
	Service(#[from] horeca_service::Error),
}
