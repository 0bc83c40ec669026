use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::catalog::QuestionCatalog;
use super::domain::SessionId;
use super::repository::SessionRepository;
use super::service::{
    AnswerSubmission, ScreeningError, ScreeningService, StartScreeningRequest,
};

/// Router builder exposing the screening endpoints.
pub fn screening_router<R, C>(service: Arc<ScreeningService<R, C>>) -> Router
where
    R: SessionRepository + 'static,
    C: QuestionCatalog + 'static,
{
    Router::new()
        .route("/api/v1/screenings", post(start_handler::<R, C>))
        .route(
            "/api/v1/screenings/:session_id",
            get(status_handler::<R, C>),
        )
        .route(
            "/api/v1/screenings/:session_id/answers",
            post(answer_handler::<R, C>),
        )
        .route(
            "/api/v1/screenings/:session_id/result",
            get(result_handler::<R, C>),
        )
        .with_state(service)
}

pub(crate) async fn start_handler<R, C>(
    State(service): State<Arc<ScreeningService<R, C>>>,
    payload: Result<axum::Json<StartScreeningRequest>, JsonRejection>,
) -> Response
where
    R: SessionRepository + 'static,
    C: QuestionCatalog + 'static,
{
    let axum::Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => return rejected_body(rejection),
    };
    match service.start_screening(request) {
        Ok(started) => (StatusCode::CREATED, axum::Json(started)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn answer_handler<R, C>(
    State(service): State<Arc<ScreeningService<R, C>>>,
    Path(session_id): Path<String>,
    payload: Result<axum::Json<AnswerSubmission>, JsonRejection>,
) -> Response
where
    R: SessionRepository + 'static,
    C: QuestionCatalog + 'static,
{
    let axum::Json(submission) = match payload {
        Ok(submission) => submission,
        Err(rejection) => return rejected_body(rejection),
    };
    match service.submit_answer(&SessionId(session_id), submission) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn status_handler<R, C>(
    State(service): State<Arc<ScreeningService<R, C>>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
    C: QuestionCatalog + 'static,
{
    match service.get_status(&SessionId(session_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn result_handler<R, C>(
    State(service): State<Arc<ScreeningService<R, C>>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
    C: QuestionCatalog + 'static,
{
    match service.get_result(&SessionId(session_id)) {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Malformed request bodies keep axum's status but use the same error shape as the service.
fn rejected_body(rejection: JsonRejection) -> Response {
    let payload = json!({
        "error": rejection.body_text(),
        "retryable": false,
    });
    (rejection.status(), axum::Json(payload)).into_response()
}

impl IntoResponse for ScreeningError {
    fn into_response(self) -> Response {
        let status = match &self {
            ScreeningError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ScreeningError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ScreeningError::NotCompleted(_) | ScreeningError::Conflict(_) => StatusCode::CONFLICT,
            ScreeningError::Persistence(_) | ScreeningError::CatalogUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };

        let payload = json!({
            "error": self.to_string(),
            "retryable": self.is_retryable(),
        });
        (status, axum::Json(payload)).into_response()
    }
}
