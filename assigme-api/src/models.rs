use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{
    annonces, calls, categories, conversations, favoris, images, messages, sous_categories, users,
};

// --- User ---

#[derive(Debug, Queryable, Identifiable, Clone)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub account_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub account_type: String,
}

// --- Categorie / SousCategorie ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = categories)]
pub struct Categorie {
    pub id: Uuid,
    pub nom: String,
}

#[derive(Debug, Queryable, Identifiable, Associations, Serialize, Clone)]
#[diesel(belongs_to(Categorie))]
#[diesel(table_name = sous_categories)]
pub struct SousCategorie {
    pub id: Uuid,
    pub categorie_id: Uuid,
    pub nom: String,
}

// --- Annonce ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = annonces)]
pub struct Annonce {
    pub id: Uuid,
    pub user_id: Uuid,
    pub titre: String,
    pub description: String,
    pub prix: f64,
    pub categorie_id: Uuid,
    pub sous_categorie_id: Option<Uuid>,
    pub ville: String,
    pub is_boosted: bool,
    pub date_creation: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = annonces)]
pub struct NewAnnonce {
    pub user_id: Uuid,
    pub titre: String,
    pub description: String,
    pub prix: f64,
    pub categorie_id: Uuid,
    pub sous_categorie_id: Option<Uuid>,
    pub ville: String,
    pub is_boosted: bool,
}

/// Partial update: `None` fields keep their existing values.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = annonces)]
pub struct AnnonceChangeset {
    pub titre: Option<String>,
    pub description: Option<String>,
    pub prix: Option<f64>,
    pub categorie_id: Option<Uuid>,
    pub sous_categorie_id: Option<Option<Uuid>>,
    pub ville: Option<String>,
    pub is_boosted: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

// --- Image ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = images)]
pub struct Image {
    pub id: Uuid,
    pub annonce_id: Uuid,
    pub url: String,
    pub thumbnail_url: String,
    pub medium_url: String,
    pub ordre: i32,
    pub is_principal: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = images)]
pub struct NewImage {
    pub annonce_id: Uuid,
    pub url: String,
    pub thumbnail_url: String,
    pub medium_url: String,
    pub ordre: i32,
    pub is_principal: bool,
}

// --- Conversation ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = conversations)]
pub struct Conversation {
    pub id: Uuid,
    pub annonce_id: Uuid,
    pub acheteur_id: Uuid,
    pub vendeur_id: Uuid,
    pub status: String,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.acheteur_id == user_id || self.vendeur_id == user_id
    }

    /// The other side of the thread, from `user_id`'s point of view.
    pub fn counterpart(&self, user_id: Uuid) -> Uuid {
        if self.acheteur_id == user_id {
            self.vendeur_id
        } else {
            self.acheteur_id
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = conversations)]
pub struct NewConversation {
    pub annonce_id: Uuid,
    pub acheteur_id: Uuid,
    pub vendeur_id: Uuid,
}

/// The three valid thread states. Transitions between any pair are
/// allowed; the status is set directly, never stepped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Archived,
    Blocked,
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationStatus::Active => write!(f, "active"),
            ConversationStatus::Archived => write!(f, "archived"),
            ConversationStatus::Blocked => write!(f, "blocked"),
        }
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ConversationStatus::Active),
            "archived" => Ok(ConversationStatus::Archived),
            "blocked" => Ok(ConversationStatus::Blocked),
            _ => Err(format!("invalid conversation status: {s}")),
        }
    }
}

// --- Message ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub call_status: Option<String>,
    pub call_duration: Option<i32>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub type_: String,
    pub call_status: Option<String>,
}

// --- Favori ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = favoris)]
pub struct Favori {
    pub id: Uuid,
    pub user_id: Uuid,
    pub annonce_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = favoris)]
pub struct NewFavori {
    pub user_id: Uuid,
    pub annonce_id: Uuid,
}

// --- Call ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = calls)]
pub struct Call {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub initiator_id: Uuid,
    pub receiver_id: Uuid,
    #[serde(rename = "type")]
    pub type_: String,
    pub room_id: String,
    pub status: String,
    pub answered_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Call {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.initiator_id == user_id || self.receiver_id == user_id
    }

    /// Elapsed seconds since pickup, 0 for calls that were never answered.
    pub fn duration_until(&self, ended_at: DateTime<Utc>) -> i32 {
        match self.answered_at {
            Some(answered) => (ended_at - answered).num_seconds().max(0) as i32,
            None => 0,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = calls)]
pub struct NewCall {
    pub conversation_id: Uuid,
    pub initiator_id: Uuid,
    pub receiver_id: Uuid,
    pub type_: String,
    pub room_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Audio,
    Video,
}

impl std::fmt::Display for CallType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallType::Audio => write!(f, "audio"),
            CallType::Video => write!(f, "video"),
        }
    }
}

impl CallType {
    /// Message `type` recorded for the system message of this call.
    pub fn message_type(&self) -> &'static str {
        match self {
            CallType::Audio => "audio_call",
            CallType::Video => "video_call",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn call_at(answered_at: Option<DateTime<Utc>>) -> Call {
        let now = Utc::now();
        Call {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            initiator_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            type_: "audio".into(),
            room_id: "room".into(),
            status: "accepted".into(),
            answered_at,
            ended_at: None,
            duration: None,
            created_at: now,
        }
    }

    #[test]
    fn counterpart_flips_sides() {
        let acheteur = Uuid::new_v4();
        let vendeur = Uuid::new_v4();
        let conv = Conversation {
            id: Uuid::new_v4(),
            annonce_id: Uuid::new_v4(),
            acheteur_id: acheteur,
            vendeur_id: vendeur,
            status: "active".into(),
            last_message_at: Utc::now(),
            created_at: Utc::now(),
        };

        assert_eq!(conv.counterpart(acheteur), vendeur);
        assert_eq!(conv.counterpart(vendeur), acheteur);
        assert!(conv.is_participant(acheteur));
        assert!(!conv.is_participant(Uuid::new_v4()));
    }

    #[test]
    fn conversation_status_rejects_unknown_values() {
        assert!("active".parse::<ConversationStatus>().is_ok());
        assert!("archived".parse::<ConversationStatus>().is_ok());
        assert!("blocked".parse::<ConversationStatus>().is_ok());
        assert!("deleted".parse::<ConversationStatus>().is_err());
        assert!("Active".parse::<ConversationStatus>().is_err());
    }

    #[test]
    fn unanswered_call_has_zero_duration() {
        let call = call_at(None);
        assert_eq!(call.duration_until(Utc::now()), 0);
    }

    #[test]
    fn answered_call_duration_counts_from_pickup() {
        let answered = Utc::now() - Duration::seconds(95);
        let call = call_at(Some(answered));
        let duration = call.duration_until(Utc::now());
        assert!((94..=96).contains(&duration));
    }

    #[test]
    fn call_type_maps_to_message_type() {
        assert_eq!(CallType::Audio.message_type(), "audio_call");
        assert_eq!(CallType::Video.message_type(), "video_call");
    }
}
