use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use assigme_shared::errors::{AppError, AppResult, ErrorCode};
use assigme_shared::types::auth::AuthUser;
use assigme_shared::types::ApiResponse;

use crate::models::{Call, CallType, NewCall, NewMessage};
use crate::routes::conversations::load_participant_conversation;
use crate::schema::{calls, messages};
use crate::services::token_service::generate_room_id;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct InitiateCallRequest {
    pub conversation_id: Uuid,
    #[serde(rename = "type")]
    pub type_: CallType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallAction {
    Accept,
    Reject,
}

#[derive(Debug, Deserialize)]
pub struct RespondCallRequest {
    pub action: CallAction,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStarted {
    pub call_id: Uuid,
    pub room_id: String,
}

/// POST /api/calls - create signaling metadata for a call attempt
pub async fn initiate_call(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<InitiateCallRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CallStarted>>)> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let conversation = load_participant_conversation(&mut conn, req.conversation_id, user.id)?;
    let receiver_id = conversation.counterpart(user.id);
    let room_id = generate_room_id(conversation.id);

    let call = conn.transaction::<Call, diesel::result::Error, _>(|conn| {
        let call: Call = diesel::insert_into(calls::table)
            .values(&NewCall {
                conversation_id: conversation.id,
                initiator_id: user.id,
                receiver_id,
                type_: req.type_.to_string(),
                room_id: room_id.clone(),
            })
            .get_result(conn)?;

        // The call also shows up in the thread as a system message whose
        // call_status tracks the call row.
        diesel::insert_into(messages::table)
            .values(&NewMessage {
                conversation_id: conversation.id,
                sender_id: user.id,
                content: format!("A initié un appel {}", req.type_),
                type_: req.type_.message_type().to_owned(),
                call_status: Some("initiated".to_owned()),
            })
            .execute(conn)?;

        Ok(call)
    })?;

    tracing::info!(call_id = %call.id, conversation_id = %conversation.id, "call initiated");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            CallStarted {
                call_id: call.id,
                room_id: call.room_id,
            },
            "appel initié",
        )),
    ))
}

/// PUT /api/calls/:callId/response - receiver accepts or rejects
pub async fn respond_call(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<Uuid>,
    Json(req): Json<RespondCallRequest>,
) -> AppResult<Json<ApiResponse<Call>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let call = load_call(&mut conn, call_id)?;
    if call.receiver_id != user.id {
        return Err(AppError::new(
            ErrorCode::NotCallReceiver,
            "seul le destinataire peut répondre",
        ));
    }
    if call.status != "initiated" {
        return Err(AppError::new(
            ErrorCode::InvalidCallAction,
            "cet appel n'est plus en attente",
        ));
    }

    let (status, answered_at) = match req.action {
        CallAction::Accept => ("accepted", Some(Utc::now())),
        CallAction::Reject => ("rejected", None),
    };

    let updated = conn.transaction::<Call, diesel::result::Error, _>(|conn| {
        let updated: Call = diesel::update(calls::table.find(call.id))
            .set((
                calls::status.eq(status),
                calls::answered_at.eq(answered_at),
            ))
            .get_result(conn)?;

        propagate_call_status(conn, &updated, status, None)?;

        Ok(updated)
    })?;

    Ok(Json(ApiResponse::ok_with_message(updated, "réponse enregistrée")))
}

/// PUT /api/calls/:callId/end - either participant hangs up
pub async fn end_call(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Call>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let call = load_call(&mut conn, call_id)?;
    if !call.is_participant(user.id) {
        return Err(AppError::new(ErrorCode::NotCallParticipant, "non autorisé"));
    }
    if call.ended_at.is_some() {
        return Err(AppError::new(
            ErrorCode::InvalidCallAction,
            "cet appel est déjà terminé",
        ));
    }

    let ended_at = Utc::now();
    let duration = call.duration_until(ended_at);

    let updated = conn.transaction::<Call, diesel::result::Error, _>(|conn| {
        let updated: Call = diesel::update(calls::table.find(call.id))
            .set((
                calls::status.eq("ended"),
                calls::ended_at.eq(Some(ended_at)),
                calls::duration.eq(Some(duration)),
            ))
            .get_result(conn)?;

        propagate_call_status(conn, &updated, "ended", Some(duration))?;

        Ok(updated)
    })?;

    Ok(Json(ApiResponse::ok_with_message(updated, "appel terminé")))
}

fn load_call(conn: &mut PgConnection, call_id: Uuid) -> AppResult<Call> {
    calls::table
        .find(call_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::CallNotFound, "appel introuvable"))
}

/// Message states a call-event message may be in when the call moves
/// to `next`. Only messages still in one of these states are retagged,
/// so earlier, already-settled calls in the same thread stay untouched.
fn propagatable_states(next: &str) -> &'static [&'static str] {
    match next {
        "ended" => &["initiated", "accepted"],
        _ => &["initiated"],
    }
}

/// Keep the thread's call-event message in sync with the call row.
fn propagate_call_status(
    conn: &mut PgConnection,
    call: &Call,
    status: &str,
    duration: Option<i32>,
) -> Result<(), diesel::result::Error> {
    diesel::update(
        messages::table
            .filter(messages::conversation_id.eq(call.conversation_id))
            .filter(messages::type_.eq_any(["audio_call", "video_call"]))
            .filter(messages::call_status.eq_any(propagatable_states(status))),
    )
    .set((
        messages::call_status.eq(Some(status.to_owned())),
        messages::call_duration.eq(duration),
    ))
    .execute(conn)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settled_calls_are_not_retagged() {
        // Accept and reject only touch a still-ringing message; a
        // second call in the same thread cannot rewrite the first
        // call's ended or rejected message.
        assert_eq!(propagatable_states("accepted"), ["initiated"].as_slice());
        assert_eq!(propagatable_states("rejected"), ["initiated"].as_slice());
        assert_eq!(
            propagatable_states("ended"),
            ["initiated", "accepted"].as_slice()
        );
    }

    #[test]
    fn call_action_parses_lowercase() {
        let accept: CallAction = serde_json::from_str("\"accept\"").unwrap();
        let reject: CallAction = serde_json::from_str("\"reject\"").unwrap();
        assert!(matches!(accept, CallAction::Accept));
        assert!(matches!(reject, CallAction::Reject));
        assert!(serde_json::from_str::<CallAction>("\"hangup\"").is_err());
    }
}
