use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use server_api::{
    create_tag, delete_survey, list_all_surveys, list_answered_surveys, list_tags,
    list_unanswered_surveys, save_survey, submit_survey_response, submit_vote, survey_detail,
    survey_questions, survey_responses, thread_votes,
};
use shared::{
    domain::{AlumniId, SurveyId, ThreadId},
    error::{ApiError, ErrorCode},
    protocol::{
        CreateTagRequest, MessageResponse, NewSurvey, ServerEvent, SubmitSurveyResponseRequest,
        SubmitVoteRequest, SurveyCreatedResponse, SurveyDetail, SurveyListResponse,
        SurveyQuestions, SurveyResponsesEnvelope, TagSummary, VoteTally,
    },
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, warn};

use crate::app_state::AppState;

type HttpError = (StatusCode, Json<ApiError>);
type HttpResult<T> = Result<T, HttpError>;

#[derive(Debug, Deserialize)]
struct AlumniQuery {
    alumni_id: i64,
}

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/threads/:thread_id/votes",
            get(http_thread_votes).post(http_submit_vote),
        )
        .route("/tags", get(http_list_tags).post(http_create_tag))
        .route("/surveys", get(http_list_surveys).post(http_save_survey))
        .route(
            "/surveys/:survey_id",
            get(http_survey_detail).delete(http_delete_survey),
        )
        .route("/surveys/:survey_id/questions", get(http_survey_questions))
        .route(
            "/surveys/:survey_id/responses",
            get(http_survey_responses).post(http_submit_survey_response),
        )
        .route(
            "/alumni/:alumni_id/surveys/answered",
            get(http_answered_surveys),
        )
        .route(
            "/alumni/:alumni_id/surveys/unanswered",
            get(http_unanswered_surveys),
        )
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn http_error(err: ApiError) -> HttpError {
    (status_for(err.code), Json(err))
}

async fn healthz(State(state): State<Arc<AppState>>) -> HttpResult<&'static str> {
    state.api.storage.health_check().await.map_err(|e| {
        warn!(error = %e, "health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        )
    })?;
    Ok("ok")
}

async fn http_thread_votes(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<i64>,
    Query(q): Query<AlumniQuery>,
) -> HttpResult<Json<VoteTally>> {
    let tally = thread_votes(&state.api, ThreadId(thread_id), AlumniId(q.alumni_id))
        .await
        .map_err(http_error)?;
    Ok(Json(tally))
}

async fn http_submit_vote(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<i64>,
    Json(req): Json<SubmitVoteRequest>,
) -> HttpResult<Json<VoteTally>> {
    let tally = submit_vote(&state.api, ThreadId(thread_id), &req)
        .await
        .map_err(|e| {
            debug!(thread_id, code = ?e.code, "vote rejected");
            http_error(e)
        })?;
    state.publish(ServerEvent::ThreadVotesUpdated {
        thread_id: tally.thread_id,
        upvotes: tally.upvotes,
        downvotes: tally.downvotes,
    });
    Ok(Json(tally))
}

async fn http_list_tags(State(state): State<Arc<AppState>>) -> HttpResult<Json<Vec<TagSummary>>> {
    let tags = list_tags(&state.api).await.map_err(http_error)?;
    Ok(Json(tags))
}

async fn http_create_tag(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTagRequest>,
) -> HttpResult<(StatusCode, Json<TagSummary>)> {
    let tag = create_tag(&state.api, &req.name)
        .await
        .map_err(http_error)?;
    state.publish(ServerEvent::TagCreated { tag: tag.clone() });
    Ok((StatusCode::CREATED, Json(tag)))
}

async fn http_list_surveys(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<SurveyListResponse>> {
    let surveys = list_all_surveys(&state.api).await.map_err(http_error)?;
    Ok(Json(surveys))
}

async fn http_save_survey(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSurvey>,
) -> HttpResult<(StatusCode, Json<SurveyCreatedResponse>)> {
    let created = save_survey(&state.api, &req).await.map_err(http_error)?;
    state.publish(ServerEvent::SurveyPublished {
        survey: created.survey.clone(),
    });
    Ok((StatusCode::CREATED, Json(created)))
}

async fn http_survey_detail(
    State(state): State<Arc<AppState>>,
    Path(survey_id): Path<i64>,
) -> HttpResult<Json<SurveyDetail>> {
    let detail = survey_detail(&state.api, SurveyId(survey_id))
        .await
        .map_err(http_error)?;
    Ok(Json(detail))
}

async fn http_delete_survey(
    State(state): State<Arc<AppState>>,
    Path(survey_id): Path<i64>,
) -> HttpResult<Json<MessageResponse>> {
    let survey_id = SurveyId(survey_id);
    let deleted = delete_survey(&state.api, survey_id)
        .await
        .map_err(http_error)?;
    state.publish(ServerEvent::SurveyDeleted { survey_id });
    Ok(Json(deleted))
}

async fn http_survey_questions(
    State(state): State<Arc<AppState>>,
    Path(survey_id): Path<i64>,
) -> HttpResult<Json<SurveyQuestions>> {
    let questions = survey_questions(&state.api, SurveyId(survey_id))
        .await
        .map_err(http_error)?;
    Ok(Json(questions))
}

async fn http_submit_survey_response(
    State(state): State<Arc<AppState>>,
    Path(survey_id): Path<i64>,
    Json(req): Json<SubmitSurveyResponseRequest>,
) -> HttpResult<(StatusCode, Json<MessageResponse>)> {
    let message = submit_survey_response(&state.api, SurveyId(survey_id), &req)
        .await
        .map_err(http_error)?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn http_survey_responses(
    State(state): State<Arc<AppState>>,
    Path(survey_id): Path<i64>,
) -> HttpResult<Json<SurveyResponsesEnvelope>> {
    let responses = survey_responses(&state.api, SurveyId(survey_id))
        .await
        .map_err(http_error)?;
    Ok(Json(responses))
}

async fn http_answered_surveys(
    State(state): State<Arc<AppState>>,
    Path(alumni_id): Path<i64>,
) -> HttpResult<Json<SurveyListResponse>> {
    let surveys = list_answered_surveys(&state.api, AlumniId(alumni_id))
        .await
        .map_err(http_error)?;
    Ok(Json(surveys))
}

async fn http_unanswered_surveys(
    State(state): State<Arc<AppState>>,
    Path(alumni_id): Path<i64>,
) -> HttpResult<Json<SurveyListResponse>> {
    let surveys = list_unanswered_surveys(&state.api, AlumniId(alumni_id))
        .await
        .map_err(http_error)?;
    Ok(Json(surveys))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: axum::extract::ws::WebSocket) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();

    let send_task = tokio::spawn(async move {
        while let Ok(event) = events_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

#[cfg(test)]
#[path = "tests/routes_tests.rs"]
mod tests;
