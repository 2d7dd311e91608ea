use super::state::SharedState;
use super::ApiError;
use crate::models::{
    BoardRecord, CreateBoardPayload, CreateImagePayload, FeedbackPayload, GeneratedImageRecord,
};
use crate::Error;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

type JsonBody<T> = Result<Json<T>, JsonRejection>;

fn body<T>(payload: JsonBody<T>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError(Error::Validation(rejection.body_text())))
}

pub(crate) async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub(crate) async fn handle_create_board(
    State(state): State<SharedState>,
    payload: JsonBody<CreateBoardPayload>,
) -> Result<(StatusCode, Json<BoardRecord>), ApiError> {
    let record = state.boards.create_board(body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub(crate) async fn handle_list_boards(
    State(state): State<SharedState>,
) -> Result<Json<Vec<BoardRecord>>, ApiError> {
    Ok(Json(state.boards.list_boards().await?))
}

pub(crate) async fn handle_create_image(
    State(state): State<SharedState>,
    payload: JsonBody<CreateImagePayload>,
) -> Result<(StatusCode, Json<GeneratedImageRecord>), ApiError> {
    let record = state.boards.create_image(body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub(crate) async fn handle_list_images(
    State(state): State<SharedState>,
) -> Result<Json<Vec<GeneratedImageRecord>>, ApiError> {
    Ok(Json(state.boards.list_images().await?))
}

pub(crate) async fn handle_feedback(
    State(state): State<SharedState>,
    payload: JsonBody<FeedbackPayload>,
) -> Result<impl IntoResponse, ApiError> {
    state.feedback.submit(body(payload)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "Feedback submitted successfully" })),
    ))
}

pub(crate) async fn handle_not_found() -> impl IntoResponse {
    super::json_error(StatusCode::NOT_FOUND, "not found")
}
