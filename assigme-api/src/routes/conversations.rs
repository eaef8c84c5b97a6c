use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use assigme_shared::errors::{AppError, AppResult, ErrorCode};
use assigme_shared::types::auth::AuthUser;
use assigme_shared::types::ApiResponse;

use crate::models::{
    Annonce, Conversation, ConversationStatus, Message, NewConversation, NewMessage,
};
use crate::schema::{annonces, conversations, images, messages, users};
use crate::AppState;

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// --- Response DTOs ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStarted {
    pub conversation_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub annonce_id: Uuid,
    pub annonce_titre: String,
    pub annonce_prix: f64,
    pub annonce_image: Option<String>,
    pub interlocuteur: String,
    pub status: String,
    pub last_message: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub sender_name: String,
}

// --- Handlers ---

/// POST /api/conversations/annonce/:annonceId
///
/// One thread per (annonce, acheteur, vendeur); a second attempt gets
/// 409 carrying the existing conversation id so the client can reopen it.
pub async fn start_conversation(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(annonce_id): Path<Uuid>,
    Json(req): Json<StartConversationRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ConversationStarted>>)> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let annonce: Annonce = annonces::table
        .find(annonce_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::AnnonceNotFound, "annonce introuvable"))?;

    if annonce.user_id == user.id {
        return Err(AppError::new(
            ErrorCode::SelfConversation,
            "impossible de se contacter soi-même",
        ));
    }

    let existing: Option<Uuid> = conversations::table
        .filter(conversations::annonce_id.eq(annonce_id))
        .filter(conversations::acheteur_id.eq(user.id))
        .filter(conversations::vendeur_id.eq(annonce.user_id))
        .select(conversations::id)
        .first(&mut conn)
        .optional()?;
    if let Some(conversation_id) = existing {
        return Err(already_exists(conversation_id));
    }

    let first_message = req
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_owned);

    let created = conn.transaction::<Conversation, diesel::result::Error, _>(|conn| {
        let conversation: Conversation = diesel::insert_into(conversations::table)
            .values(&NewConversation {
                annonce_id,
                acheteur_id: user.id,
                vendeur_id: annonce.user_id,
            })
            .get_result(conn)?;

        if let Some(content) = &first_message {
            diesel::insert_into(messages::table)
                .values(&NewMessage {
                    conversation_id: conversation.id,
                    sender_id: user.id,
                    content: content.clone(),
                    type_: "text".into(),
                    call_status: None,
                })
                .execute(conn)?;
            diesel::update(conversations::table.find(conversation.id))
                .set(conversations::last_message_at.eq(diesel::dsl::now))
                .execute(conn)?;
        }

        Ok(conversation)
    });

    let conversation = match created {
        Ok(conversation) => conversation,
        // Lost the race against a concurrent first contact: the unique
        // index fired, so surface the winner's id instead.
        Err(e) if AppError::is_unique_violation(&e) => {
            let winner: Uuid = conversations::table
                .filter(conversations::annonce_id.eq(annonce_id))
                .filter(conversations::acheteur_id.eq(user.id))
                .filter(conversations::vendeur_id.eq(annonce.user_id))
                .select(conversations::id)
                .first(&mut conn)?;
            return Err(already_exists(winner));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(conversation_id = %conversation.id, annonce_id = %annonce_id, "conversation started");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            ConversationStarted {
                conversation_id: conversation.id,
            },
            "conversation créée",
        )),
    ))
}

/// GET /api/conversations - the caller's threads, most recent activity first
pub async fn list_conversations(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<ConversationSummary>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let threads: Vec<Conversation> = conversations::table
        .filter(
            conversations::acheteur_id
                .eq(user.id)
                .or(conversations::vendeur_id.eq(user.id)),
        )
        .order(conversations::last_message_at.desc())
        .load(&mut conn)?;

    let mut summaries = Vec::with_capacity(threads.len());
    for conversation in threads {
        let (annonce_titre, annonce_prix): (String, f64) = annonces::table
            .find(conversation.annonce_id)
            .select((annonces::titre, annonces::prix))
            .first(&mut conn)?;

        let annonce_image: Option<String> = images::table
            .filter(images::annonce_id.eq(conversation.annonce_id))
            .filter(images::is_principal.eq(true))
            .select(images::thumbnail_url)
            .first(&mut conn)
            .optional()?;

        let interlocuteur: String = users::table
            .find(conversation.counterpart(user.id))
            .select(users::full_name)
            .first(&mut conn)?;

        let last_message: Option<String> = messages::table
            .filter(messages::conversation_id.eq(conversation.id))
            .order(messages::created_at.desc())
            .select(messages::content)
            .first(&mut conn)
            .optional()?;

        let unread_count: i64 = messages::table
            .filter(messages::conversation_id.eq(conversation.id))
            .filter(messages::sender_id.ne(user.id))
            .filter(messages::read_at.is_null())
            .count()
            .get_result(&mut conn)?;

        summaries.push(ConversationSummary {
            id: conversation.id,
            annonce_id: conversation.annonce_id,
            annonce_titre,
            annonce_prix,
            annonce_image,
            interlocuteur,
            status: conversation.status,
            last_message,
            last_message_at: conversation.last_message_at,
            unread_count,
        });
    }

    Ok(Json(ApiResponse::ok(summaries)))
}

/// GET /api/conversations/:id/messages
///
/// Reading the thread marks the counterpart's unread messages as read.
pub async fn get_messages(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<MessageView>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    load_participant_conversation(&mut conn, conversation_id, user.id)?;

    let rows: Vec<(Message, String)> = messages::table
        .inner_join(users::table)
        .filter(messages::conversation_id.eq(conversation_id))
        .order(messages::created_at.asc())
        .select((messages::all_columns, users::full_name))
        .load(&mut conn)?;

    diesel::update(
        messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .filter(messages::sender_id.ne(user.id))
            .filter(messages::read_at.is_null()),
    )
    .set(messages::read_at.eq(diesel::dsl::now))
    .execute(&mut conn)?;

    let views = rows
        .into_iter()
        .map(|(message, sender_name)| MessageView {
            message,
            sender_name,
        })
        .collect();

    Ok(Json(ApiResponse::ok(views)))
}

/// POST /api/conversations/:id/messages
pub async fn send_message(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Message>>)> {
    let content = req.content.trim().to_owned();
    if content.is_empty() {
        return Err(AppError::new(ErrorCode::EmptyMessage, "message vide"));
    }

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    load_participant_conversation(&mut conn, conversation_id, user.id)?;

    let message = conn.transaction::<Message, diesel::result::Error, _>(|conn| {
        let message: Message = diesel::insert_into(messages::table)
            .values(&NewMessage {
                conversation_id,
                sender_id: user.id,
                content: content.clone(),
                type_: "text".into(),
                call_status: None,
            })
            .get_result(conn)?;

        diesel::update(conversations::table.find(conversation_id))
            .set(conversations::last_message_at.eq(message.created_at))
            .execute(conn)?;

        Ok(message)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(message, "message envoyé")),
    ))
}

/// PUT /api/conversations/:id/status
pub async fn update_status(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> AppResult<Json<ApiResponse<Conversation>>> {
    let status: ConversationStatus = req.status.parse().map_err(|_| {
        AppError::new(
            ErrorCode::InvalidConversationStatus,
            "status invalide (active, archived ou blocked)",
        )
    })?;

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    load_participant_conversation(&mut conn, conversation_id, user.id)?;

    let updated: Conversation = diesel::update(conversations::table.find(conversation_id))
        .set(conversations::status.eq(status.to_string()))
        .get_result(&mut conn)?;

    Ok(Json(ApiResponse::ok_with_message(updated, "status mis à jour")))
}

fn already_exists(conversation_id: Uuid) -> AppError {
    AppError::with_details(
        ErrorCode::ConversationAlreadyExists,
        "conversation déjà existante",
        json!({ "conversationId": conversation_id }),
    )
}

/// 404 for unknown threads, 403 when the caller is neither side.
pub(crate) fn load_participant_conversation(
    conn: &mut PgConnection,
    conversation_id: Uuid,
    user_id: Uuid,
) -> AppResult<Conversation> {
    let conversation: Conversation = conversations::table
        .find(conversation_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| {
            AppError::new(ErrorCode::ConversationNotFound, "conversation introuvable")
        })?;

    if !conversation.is_participant(user_id) {
        return Err(AppError::new(
            ErrorCode::NotConversationParticipant,
            "non autorisé",
        ));
    }

    Ok(conversation)
}
