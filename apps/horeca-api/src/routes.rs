use axum::{
	Json, Router,
	extract::{
		Path, Query, State,
		rejection::{JsonRejection, QueryRejection},
	},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;
use horeca_domain::Endpoint;
use horeca_service::{
	ConnectionReport, Error as ServiceError, PnlAggregateRequest, PnlAggregateResponse,
	ProcessEndpointRequest, ProcessEndpointResponse, ProgressQuery, ProgressResponse, SyncReport,
	SyncRequest,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/sync/{endpoint}", post(sync))
		.route("/progress", get(progress))
		.route("/process-endpoint", post(process_endpoint))
		.route("/pnl-aggregate", post(pnl_aggregate))
		.route("/eitje/connection", get(eitje_connection))
		.with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	success: bool,
	version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
	success: bool,
	#[serde(flatten)]
	data: T,
}

async fn health() -> Json<HealthResponse> {
	Json(HealthResponse { success: true, version: horeca_cli::VERSION })
}

async fn sync(
	State(state): State<AppState>,
	Path(endpoint): Path<String>,
	payload: Result<Json<SyncRequest>, JsonRejection>,
) -> Result<Json<SyncReport>, ApiError> {
	let endpoint = parse_endpoint(&endpoint)?;
	let Json(payload) = payload?;
	let report = state.service.sync(endpoint, payload).await?;

	Ok(Json(report))
}

async fn progress(
	State(state): State<AppState>,
	query: Result<Query<ProgressQuery>, QueryRejection>,
) -> Result<Json<Envelope<ProgressResponse>>, ApiError> {
	let Query(query) = query?;
	let response = state.service.progress(query).await?;

	Ok(Json(Envelope { success: true, data: response }))
}

async fn process_endpoint(
	State(state): State<AppState>,
	payload: Result<Json<ProcessEndpointRequest>, JsonRejection>,
) -> Result<Json<ProcessEndpointResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.process_endpoint(payload).await?;

	Ok(Json(response))
}

async fn pnl_aggregate(
	State(state): State<AppState>,
	payload: Result<Json<PnlAggregateRequest>, JsonRejection>,
) -> Result<Json<PnlAggregateResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.pnl_aggregate(payload).await?;

	Ok(Json(response))
}

async fn eitje_connection(State(state): State<AppState>) -> Result<Json<ConnectionReport>, ApiError> {
	let response = state.service.eitje_connection().await?;

	Ok(Json(response))
}

fn parse_endpoint(raw: &str) -> Result<Endpoint, ApiError> {
	raw.parse().map_err(|err: horeca_domain::UnknownEndpoint| {
		json_error(StatusCode::BAD_REQUEST, "unknown_endpoint", err.to_string())
	})
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
	success: bool,
	error_code: String,
	error: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message),
			ServiceError::Configuration { message } =>
				json_error(StatusCode::UNPROCESSABLE_ENTITY, "configuration", message),
			ServiceError::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "not_found", message),
			ServiceError::Provider { message } =>
				json_error(StatusCode::BAD_GATEWAY, "provider", message),
			ServiceError::Storage { message } => {
				tracing::error!(error = %message, "Storage failure.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage", "Storage is unavailable.")
			},
		}
	}
}

impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
	}
}

impl From<QueryRejection> for ApiError {
	fn from(rejection: QueryRejection) -> Self {
		json_error(StatusCode::BAD_REQUEST, "invalid_query", rejection.body_text())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { success: false, error_code: self.error_code, error: self.message };

		(self.status, Json(body)).into_response()
	}
}
