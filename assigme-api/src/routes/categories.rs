use axum::extract::{Path, State};
use axum::Json;
use diesel::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use assigme_shared::errors::{AppError, AppResult, ErrorCode};
use assigme_shared::types::ApiResponse;

use crate::models::{Categorie, SousCategorie};
use crate::schema::{categories, sous_categories};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CategorieWithSousCategories {
    #[serde(flatten)]
    pub categorie: Categorie,
    pub sous_categories: Vec<SousCategorie>,
}

/// GET /api/categories - nested tree, both levels sorted by nom
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<CategorieWithSousCategories>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let cats: Vec<Categorie> = categories::table
        .order(categories::nom.asc())
        .load(&mut conn)?;

    let subs: Vec<SousCategorie> = SousCategorie::belonging_to(&cats)
        .order(sous_categories::nom.asc())
        .load(&mut conn)?;

    let grouped = subs.grouped_by(&cats);

    let tree = cats
        .into_iter()
        .zip(grouped)
        .map(|(categorie, sous_categories)| CategorieWithSousCategories {
            categorie,
            sous_categories,
        })
        .collect();

    Ok(Json(ApiResponse::ok(tree)))
}

/// GET /api/categories/simple - flat list without children
pub async fn list_categories_simple(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<Categorie>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let cats: Vec<Categorie> = categories::table
        .order(categories::nom.asc())
        .load(&mut conn)?;

    Ok(Json(ApiResponse::ok(cats)))
}

/// GET /api/categories/:id/sous-categories
pub async fn list_sous_categories(
    State(state): State<Arc<AppState>>,
    Path(categorie_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<SousCategorie>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let exists: Option<Uuid> = categories::table
        .find(categorie_id)
        .select(categories::id)
        .first(&mut conn)
        .optional()?;
    if exists.is_none() {
        return Err(AppError::new(ErrorCode::NotFound, "catégorie introuvable"));
    }

    let subs: Vec<SousCategorie> = sous_categories::table
        .filter(sous_categories::categorie_id.eq(categorie_id))
        .order(sous_categories::nom.asc())
        .load(&mut conn)?;

    Ok(Json(ApiResponse::ok(subs)))
}
