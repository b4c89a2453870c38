//! Host ingress handlers: roster mirroring, join/leave events, and stored
//! balance lookup.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::api::dto::{
    EventAcceptedResponse, EventKind, ParticipantEventRequest, ParticipantStateDto,
    StoredBalanceResponse,
};
use crate::app_state::AppState;
use crate::domain::{Participant, ParticipantId};
use crate::error::SyncError;
use crate::persistence::BalanceLookup;

/// `PUT /participants`: Mirror host participant state.
///
/// Replaces the mirrored entry of every listed participant. No write to
/// storage happens here; the scheduler picks the state up on its own
/// schedule.
pub async fn put_participants(
    State(state): State<AppState>,
    Json(req): Json<Vec<ParticipantStateDto>>,
) -> impl IntoResponse {
    let count = req.len();
    for dto in &req {
        state.mirror.upsert(Participant::from(dto), dto.balance);
    }
    tracing::debug!(count, mirrored = state.mirror.len(), "host state mirrored");
    StatusCode::NO_CONTENT
}

/// `POST /events`: Accept a join or leave notification.
///
/// Updates the mirror first so the scheduler reads the balance the host
/// reported with the event, then publishes on the event bus. Returns
/// `202 Accepted` without waiting for any database work.
pub async fn post_event(
    State(state): State<AppState>,
    Json(req): Json<ParticipantEventRequest>,
) -> impl IntoResponse {
    let online = req.event_type == EventKind::ParticipantJoined;
    state
        .mirror
        .set_presence(req.participant_id, &req.display_name, online, req.balance);

    let event = req.to_event();
    let event_type = event.event_type_str();
    let delivered_to = state.event_bus.publish(event);
    if delivered_to == 0 {
        tracing::warn!(participant_id = %req.participant_id, event_type, "no scheduler subscribed to participant events");
    }

    (
        StatusCode::ACCEPTED,
        Json(EventAcceptedResponse {
            event_type,
            participant_id: req.participant_id,
            delivered_to,
        }),
    )
}

/// `GET /participants/{id}/balance`: Read the stored (replicated) balance.
///
/// # Errors
///
/// Returns [`SyncError::InvalidIdentifier`] for a malformed id,
/// [`SyncError::ParticipantNotFound`] if nothing is stored, and
/// [`SyncError::NotConnected`] if storage is unreachable.
pub async fn get_stored_balance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SyncError> {
    let participant_id = ParticipantId::parse(&id)?;
    match state.sync_service.store().read_balance(participant_id).await {
        BalanceLookup::Found(balance) => Ok(Json(StoredBalanceResponse {
            participant_id,
            balance,
        })),
        BalanceLookup::NotFound => Err(SyncError::ParticipantNotFound(
            *participant_id.as_uuid(),
        )),
        BalanceLookup::Unavailable => Err(SyncError::NotConnected),
    }
}

/// Participant routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/participants", put(put_participants))
        .route("/participants/{id}/balance", get(get_stored_balance))
        .route("/events", post(post_event))
}
