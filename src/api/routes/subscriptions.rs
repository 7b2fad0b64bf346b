//! `/api/subscriptions/*` — the Messenger pub/sub surface: subscribe,
//! unsubscribe, poll, and set interests.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::state::AppState;
use crate::error::{Error, MessengerError, Result};
use crate::messenger::{Interest, Message};
use crate::types::{MessageEventType, SubjectType};

/// Response from `/api/subscriptions/subscribe`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubscribeResponse {
    pub subscriber_id: Uuid,
}

/// Registers a new subscriber with no interests yet.
#[utoipa::path(
    post,
    path = "/api/subscriptions/subscribe",
    tag = "subscriptions",
    responses((status = 200, description = "New subscriber id", body = SubscribeResponse)),
)]
pub async fn subscribe(State(state): State<AppState>) -> Json<SubscribeResponse> {
    let subscriber_id = state.indexer.messenger.new_subscriber();
    Json(SubscribeResponse { subscriber_id })
}

/// Body shared by `/unsubscribe` and `/get`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscriberRequest {
    pub subscriber_id: Uuid,
}

/// Tears a subscriber down.
#[utoipa::path(
    post,
    path = "/api/subscriptions/unsubscribe",
    tag = "subscriptions",
    request_body = SubscriberRequest,
    responses((status = 204, description = "Subscriber removed")),
)]
pub async fn unsubscribe(State(state): State<AppState>, Json(body): Json<SubscriberRequest>) -> axum::http::StatusCode {
    state.indexer.messenger.remove_subscriber(body.subscriber_id);
    axum::http::StatusCode::NO_CONTENT
}

/// Response from `/api/subscriptions/get`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PollResponse {
    /// `false` once the subscriber's inbox has expired or overflowed and
    /// been torn down — the caller should `/subscribe` again.
    pub subscription_valid: bool,
    pub messages: Vec<Message>,
}

/// Drains a subscriber's buffered messages.
///
/// A subscriber whose inbox overflowed or expired is silently torn down by
/// the Messenger; polling it again isn't an error here, it just reports
/// `subscription_valid: false` with no messages, per spec.md §7.
#[utoipa::path(
    post,
    path = "/api/subscriptions/get",
    tag = "subscriptions",
    request_body = SubscriberRequest,
    responses((status = 200, description = "Buffered messages", body = PollResponse)),
)]
pub async fn get_messages(State(state): State<AppState>, Json(body): Json<SubscriberRequest>) -> Result<Json<PollResponse>> {
    match state.indexer.messenger.get_messages(body.subscriber_id) {
        Ok(messages) => Ok(Json(PollResponse {
            subscription_valid: true,
            messages,
        })),
        Err(Error::Messenger(MessengerError::SubscriberNotFound(_))) => Ok(Json(PollResponse {
            subscription_valid: false,
            messages: Vec::new(),
        })),
        Err(e) => Err(e),
    }
}

/// Body for `/api/subscriptions/set-interests`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetInterestsRequest {
    pub subscriber_id: Uuid,
    pub interests: Vec<InterestRequest>,
}

/// One interest entry: a subject type plus the event types to hear about
/// (all three, if omitted).
#[derive(Debug, Deserialize, ToSchema)]
pub struct InterestRequest {
    pub subject_type: SubjectType,
    #[serde(default)]
    pub event_types: Option<Vec<MessageEventType>>,
}

/// Replaces a subscriber's interest list.
#[utoipa::path(
    post,
    path = "/api/subscriptions/set-interests",
    tag = "subscriptions",
    request_body = SetInterestsRequest,
    responses(
        (status = 204, description = "Interests updated"),
        (status = 404, description = "No such subscriber"),
    ),
)]
pub async fn set_interests(State(state): State<AppState>, Json(body): Json<SetInterestsRequest>) -> Result<axum::http::StatusCode> {
    let interests = body
        .interests
        .into_iter()
        .map(|i| match i.event_types {
            Some(types) => Interest {
                subject_type: i.subject_type,
                event_types: types.into_iter().collect::<HashSet<_>>(),
            },
            None => Interest::all_events(i.subject_type),
        })
        .collect();

    state.indexer.messenger.set_interests(body.subscriber_id, interests)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
