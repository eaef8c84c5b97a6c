use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use diesel::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use assigme_shared::errors::{AppError, AppResult, ErrorCode};
use assigme_shared::types::auth::AuthUser;
use assigme_shared::types::ApiResponse;

use crate::models::{Annonce, Favori, NewFavori};
use crate::schema::{annonces, categories, favoris, users};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct FavoriEntry {
    pub favori_id: Uuid,
    pub saved_at: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub annonce: Annonce,
    pub vendeur: String,
    pub categorie_nom: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriCheck {
    pub is_favorite: bool,
}

/// POST /api/favoris/:annonceId
pub async fn add_favori(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(annonce_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ApiResponse<Favori>>)> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let exists: Option<Uuid> = annonces::table
        .find(annonce_id)
        .select(annonces::id)
        .first(&mut conn)
        .optional()?;
    if exists.is_none() {
        return Err(AppError::new(ErrorCode::AnnonceNotFound, "annonce introuvable"));
    }

    let new_favori = NewFavori {
        user_id: user.id,
        annonce_id,
    };

    // The (user_id, annonce_id) unique index is the authority on
    // duplicates; a concurrent double-tap lands here as a violation.
    let favori: Favori = diesel::insert_into(favoris::table)
        .values(&new_favori)
        .get_result(&mut conn)
        .map_err(|e| {
            if AppError::is_unique_violation(&e) {
                AppError::new(ErrorCode::FavoriAlreadyExists, "déjà dans vos favoris")
            } else {
                e.into()
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(favori, "ajouté aux favoris")),
    ))
}

/// DELETE /api/favoris/:annonceId
pub async fn remove_favori(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(annonce_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let deleted = diesel::delete(
        favoris::table
            .filter(favoris::user_id.eq(user.id))
            .filter(favoris::annonce_id.eq(annonce_id)),
    )
    .execute(&mut conn)?;

    if deleted == 0 {
        return Err(AppError::new(ErrorCode::FavoriNotFound, "favori introuvable"));
    }

    Ok(Json(ApiResponse::ok_with_message((), "retiré des favoris")))
}

/// GET /api/favoris - the caller's saved annonces, newest save first
pub async fn list_favoris(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<FavoriEntry>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let rows: Vec<(Favori, (Annonce, String, String))> = favoris::table
        .inner_join(
            annonces::table
                .inner_join(users::table)
                .inner_join(categories::table),
        )
        .filter(favoris::user_id.eq(user.id))
        .order(favoris::created_at.desc())
        .select((
            favoris::all_columns,
            (annonces::all_columns, users::full_name, categories::nom),
        ))
        .load(&mut conn)?;

    let entries = rows
        .into_iter()
        .map(|(favori, (annonce, vendeur, categorie_nom))| FavoriEntry {
            favori_id: favori.id,
            saved_at: favori.created_at,
            annonce,
            vendeur,
            categorie_nom,
        })
        .collect();

    Ok(Json(ApiResponse::ok(entries)))
}

/// GET /api/favoris/check/:annonceId
pub async fn check_favori(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(annonce_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<FavoriCheck>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let found: Option<Uuid> = favoris::table
        .filter(favoris::user_id.eq(user.id))
        .filter(favoris::annonce_id.eq(annonce_id))
        .select(favoris::id)
        .first(&mut conn)
        .optional()?;

    Ok(Json(ApiResponse::ok(FavoriCheck {
        is_favorite: found.is_some(),
    })))
}
