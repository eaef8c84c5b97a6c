use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use assigme_shared::errors::{AppError, AppResult, ErrorCode};
use assigme_shared::types::auth::AuthUser;
use assigme_shared::types::{ApiResponse, Pagination, PaginationParams};

use crate::models::{Annonce, AnnonceChangeset, NewAnnonce};
use crate::schema::{annonces, categories, users};
use crate::AppState;

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
pub struct CreateAnnonceRequest {
    pub titre: String,
    pub description: Option<String>,
    pub prix: f64,
    pub categorie_id: Uuid,
    pub sous_categorie_id: Option<Uuid>,
    pub ville: String,
    pub is_boosted: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAnnonceRequest {
    pub titre: Option<String>,
    pub description: Option<String>,
    pub prix: Option<f64>,
    pub categorie_id: Option<Uuid>,
    pub sous_categorie_id: Option<Uuid>,
    pub ville: Option<String>,
    pub is_boosted: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ListAnnoncesQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub categorie_id: Option<Uuid>,
    pub q: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

/// Sort keys come from an allow-list; anything else falls back to
/// creation date, silently, the way the historical API behaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Prix,
    DateCreation,
}

impl SortField {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("prix") => SortField::Prix,
            Some("date_creation") => SortField::DateCreation,
            _ => SortField::DateCreation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }
}

// --- Response DTOs ---

#[derive(Debug, Serialize)]
pub struct AnnonceSummary {
    #[serde(flatten)]
    pub annonce: Annonce,
    pub vendeur: String,
    pub categorie_nom: String,
}

#[derive(Debug, Serialize)]
pub struct AnnonceListResponse {
    pub annonces: Vec<AnnonceSummary>,
    pub pagination: Pagination,
}

// --- Handlers ---

/// POST /api/annonces
pub async fn create_annonce(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAnnonceRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Annonce>>)> {
    if req.titre.trim().is_empty() || req.titre.len() > 200 {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            "titre requis (200 caractères max)",
        ));
    }
    if req.prix <= 0.0 {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            "le prix doit être positif",
        ));
    }
    if req.ville.trim().is_empty() || req.ville.len() > 100 {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            "ville requise (100 caractères max)",
        ));
    }

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let new_annonce = NewAnnonce {
        user_id: user.id,
        titre: req.titre,
        description: req.description.unwrap_or_default(),
        prix: req.prix,
        categorie_id: req.categorie_id,
        sous_categorie_id: req.sous_categorie_id,
        ville: req.ville,
        is_boosted: req.is_boosted.unwrap_or(false),
    };

    let annonce: Annonce = diesel::insert_into(annonces::table)
        .values(&new_annonce)
        .get_result(&mut conn)?;

    tracing::info!(annonce_id = %annonce.id, user_id = %user.id, "annonce created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(annonce, "annonce créée")),
    ))
}

/// GET /api/annonces - public paginated listing
pub async fn list_annonces(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListAnnoncesQuery>,
) -> AppResult<Json<ApiResponse<AnnonceListResponse>>> {
    let params = PaginationParams {
        page: query.page.unwrap_or(1),
        limit: query.limit.unwrap_or(20),
    };
    let sort = SortField::parse(query.sort.as_deref());
    let order = SortOrder::parse(query.order.as_deref());

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let mut listing = annonces::table
        .inner_join(users::table)
        .inner_join(categories::table)
        .select((annonces::all_columns, users::full_name, categories::nom))
        .into_boxed();
    let mut counting = annonces::table.into_boxed();

    if let Some(categorie_id) = query.categorie_id {
        listing = listing.filter(annonces::categorie_id.eq(categorie_id));
        counting = counting.filter(annonces::categorie_id.eq(categorie_id));
    }

    if let Some(q) = query.q.as_deref().filter(|q| !q.trim().is_empty()) {
        let pattern = format!("%{}%", q.trim());
        listing = listing.filter(
            annonces::titre
                .ilike(pattern.clone())
                .or(annonces::description.ilike(pattern.clone())),
        );
        counting = counting.filter(
            annonces::titre
                .ilike(pattern.clone())
                .or(annonces::description.ilike(pattern)),
        );
    }

    listing = match (sort, order) {
        (SortField::Prix, SortOrder::Asc) => listing.order(annonces::prix.asc()),
        (SortField::Prix, SortOrder::Desc) => listing.order(annonces::prix.desc()),
        (SortField::DateCreation, SortOrder::Asc) => {
            listing.order(annonces::date_creation.asc())
        }
        (SortField::DateCreation, SortOrder::Desc) => {
            listing.order(annonces::date_creation.desc())
        }
    };

    let rows: Vec<(Annonce, String, String)> = listing
        .limit(params.limit())
        .offset(params.offset())
        .load(&mut conn)?;

    let total: i64 = counting.count().get_result(&mut conn)?;

    let annonces = rows
        .into_iter()
        .map(|(annonce, vendeur, categorie_nom)| AnnonceSummary {
            annonce,
            vendeur,
            categorie_nom,
        })
        .collect();

    Ok(Json(ApiResponse::ok(AnnonceListResponse {
        annonces,
        pagination: Pagination::new(total, &params),
    })))
}

/// GET /api/annonces/:id
pub async fn get_annonce(
    State(state): State<Arc<AppState>>,
    Path(annonce_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Annonce>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let annonce: Annonce = annonces::table
        .find(annonce_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::AnnonceNotFound, "annonce introuvable"))?;

    Ok(Json(ApiResponse::ok(annonce)))
}

/// PUT /api/annonces/:id - partial update, owner only
pub async fn update_annonce(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(annonce_id): Path<Uuid>,
    Json(req): Json<UpdateAnnonceRequest>,
) -> AppResult<Json<ApiResponse<Annonce>>> {
    if let Some(prix) = req.prix {
        if prix <= 0.0 {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                "le prix doit être positif",
            ));
        }
    }

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let existing = load_owned_annonce(&mut conn, annonce_id, user.id)?;

    let changes = AnnonceChangeset {
        titre: req.titre,
        description: req.description,
        prix: req.prix,
        categorie_id: req.categorie_id,
        sous_categorie_id: req.sous_categorie_id.map(Some),
        ville: req.ville,
        is_boosted: req.is_boosted,
        updated_at: Utc::now(),
    };

    let updated: Annonce = diesel::update(annonces::table.find(existing.id))
        .set(&changes)
        .get_result(&mut conn)?;

    Ok(Json(ApiResponse::ok_with_message(updated, "mise à jour réussie")))
}

/// DELETE /api/annonces/:id - owner only; images/conversations/favoris
/// rows follow via ON DELETE CASCADE.
pub async fn delete_annonce(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(annonce_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let existing = load_owned_annonce(&mut conn, annonce_id, user.id)?;

    diesel::delete(annonces::table.find(existing.id)).execute(&mut conn)?;

    tracing::info!(annonce_id = %existing.id, user_id = %user.id, "annonce deleted");

    Ok(Json(ApiResponse::ok_with_message((), "supprimé avec succès")))
}

/// GET /api/annonces/mes-annonces
pub async fn list_mes_annonces(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<Annonce>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let rows: Vec<Annonce> = annonces::table
        .filter(annonces::user_id.eq(user.id))
        .order(annonces::date_creation.desc())
        .load(&mut conn)?;

    Ok(Json(ApiResponse::ok(rows)))
}

/// Not-found and not-owner are distinct signals: 404 before 403.
pub(crate) fn load_owned_annonce(
    conn: &mut PgConnection,
    annonce_id: Uuid,
    user_id: Uuid,
) -> AppResult<Annonce> {
    let annonce: Annonce = annonces::table
        .find(annonce_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::AnnonceNotFound, "annonce introuvable"))?;

    if annonce.user_id != user_id {
        return Err(AppError::new(ErrorCode::NotAnnonceOwner, "non autorisé"));
    }

    Ok(annonce)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sort_falls_back_to_date_creation() {
        assert_eq!(SortField::parse(Some("prix")), SortField::Prix);
        assert_eq!(SortField::parse(Some("date_creation")), SortField::DateCreation);
        assert_eq!(SortField::parse(Some("id")), SortField::DateCreation);
        assert_eq!(SortField::parse(Some("titre; DROP TABLE")), SortField::DateCreation);
        assert_eq!(SortField::parse(None), SortField::DateCreation);
    }

    #[test]
    fn order_defaults_to_desc() {
        assert_eq!(SortOrder::parse(Some("asc")), SortOrder::Asc);
        assert_eq!(SortOrder::parse(Some("desc")), SortOrder::Desc);
        assert_eq!(SortOrder::parse(Some("up")), SortOrder::Desc);
        assert_eq!(SortOrder::parse(None), SortOrder::Desc);
    }
}
