use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use assigme_shared::errors::{AppError, AppResult, ErrorCode};
use assigme_shared::types::auth::AuthUser;
use assigme_shared::types::ApiResponse;

use crate::models::{Image, NewImage};
use crate::routes::annonces::load_owned_annonce;
use crate::schema::{annonces, images};
use crate::services::image_service::{self, MAX_IMAGES_PER_ANNONCE};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub image_ids: Vec<Uuid>,
}

/// Positions are contiguous and 1-based; a batch starting on an
/// annonce that already holds `current` images continues from
/// `current + 1`, matching what `reorder_images` writes.
fn continuation_ordre(current: i64, index: usize) -> i32 {
    (current + index as i64) as i32 + 1
}

/// POST /api/annonces/:id/images - multipart field `images`
pub async fn upload_images(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(annonce_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<Vec<Image>>>)> {
    // Read and validate every part before touching storage so a bad
    // file in the middle of the batch rejects the whole request.
    let mut parts: Vec<Vec<u8>> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.to_string()))?
    {
        if field.name() != Some("images") {
            continue;
        }
        let content_type = field
            .content_type()
            .ok_or_else(|| {
                AppError::new(ErrorCode::UnsupportedImageFormat, "content-type manquant")
            })?
            .to_owned();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.to_string()))?
            .to_vec();

        image_service::validate_upload(&content_type, data.len())?;
        parts.push(data);
    }

    if parts.is_empty() {
        return Err(AppError::new(ErrorCode::NoImageProvided, "aucune image fournie"));
    }
    if parts.len() as i64 > MAX_IMAGES_PER_ANNONCE {
        return Err(AppError::new(
            ErrorCode::TooManyImages,
            "maximum 5 images par annonce",
        ));
    }

    {
        let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;
        load_owned_annonce(&mut conn, annonce_id, user.id)?;
    }

    // Decoding and resizing are CPU-bound, so each file runs on a
    // blocking task.
    let mut encoded = Vec::with_capacity(parts.len());
    for data in parts {
        let processed =
            tokio::task::spawn_blocking(move || image_service::process_image(&data))
                .await
                .map_err(|e| AppError::internal(e.to_string()))??;
        encoded.push(processed);
    }

    // Variants are stored before the rows exist; if the cap check below
    // fails they are cleaned up again.
    let mut variants = Vec::with_capacity(encoded.len());
    for file in &encoded {
        let stored = image_service::store_variants(&state.minio, annonce_id, file).await?;
        variants.push(stored);
    }

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;
    let inserted = conn.transaction::<Vec<Image>, AppError, _>(|conn| {
        // The row lock serializes concurrent uploads to one annonce so
        // the cap cannot be overshot.
        let _locked: Uuid = annonces::table
            .find(annonce_id)
            .select(annonces::id)
            .for_update()
            .first(conn)
            .map_err(AppError::from)?;

        let current: i64 = images::table
            .filter(images::annonce_id.eq(annonce_id))
            .count()
            .get_result(conn)
            .map_err(AppError::from)?;

        if current + variants.len() as i64 > MAX_IMAGES_PER_ANNONCE {
            return Err(AppError::new(
                ErrorCode::TooManyImages,
                "maximum 5 images par annonce",
            ));
        }

        let rows: Vec<NewImage> = variants
            .iter()
            .enumerate()
            .map(|(i, v)| NewImage {
                annonce_id,
                url: v.large.clone(),
                thumbnail_url: v.thumbnail.clone(),
                medium_url: v.medium.clone(),
                ordre: continuation_ordre(current, i),
                is_principal: current == 0 && i == 0,
            })
            .collect();

        diesel::insert_into(images::table)
            .values(&rows)
            .get_results(conn)
            .map_err(AppError::from)
    });

    let inserted = match inserted {
        Ok(rows) => rows,
        Err(e) => {
            for v in &variants {
                image_service::delete_variants(
                    &state.minio,
                    [v.thumbnail.as_str(), v.medium.as_str(), v.large.as_str()],
                )
                .await;
            }
            return Err(e);
        }
    };

    tracing::info!(annonce_id = %annonce_id, count = inserted.len(), "images uploaded");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(inserted, "images ajoutées")),
    ))
}

/// DELETE /api/annonces/:id/images/:imageId
pub async fn delete_image(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path((annonce_id, image_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<()>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    load_owned_annonce(&mut conn, annonce_id, user.id)?;

    let image: Image = images::table
        .find(image_id)
        .filter(images::annonce_id.eq(annonce_id))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::ImageNotFound, "image introuvable"))?;

    image_service::delete_variants(
        &state.minio,
        [
            image.thumbnail_url.as_str(),
            image.medium_url.as_str(),
            image.url.as_str(),
        ],
    )
    .await;

    conn.transaction::<(), diesel::result::Error, _>(|conn| {
        diesel::delete(images::table.find(image.id)).execute(conn)?;

        // Close the gap the deleted position leaves behind.
        diesel::update(
            images::table
                .filter(images::annonce_id.eq(annonce_id))
                .filter(images::ordre.gt(image.ordre)),
        )
        .set(images::ordre.eq(images::ordre - 1))
        .execute(conn)?;

        if image.is_principal {
            let successor: Option<Uuid> = images::table
                .filter(images::annonce_id.eq(annonce_id))
                .order(images::ordre.asc())
                .select(images::id)
                .first(conn)
                .optional()?;
            if let Some(successor) = successor {
                diesel::update(images::table.find(successor))
                    .set(images::is_principal.eq(true))
                    .execute(conn)?;
            }
        }

        Ok(())
    })?;

    Ok(Json(ApiResponse::ok_with_message((), "image supprimée")))
}

/// PUT /api/annonces/:id/images/order
///
/// Every id must belong to the annonce, otherwise the order is left
/// untouched and the request fails.
pub async fn reorder_images(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(annonce_id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> AppResult<Json<ApiResponse<Vec<Image>>>> {
    if req.image_ids.is_empty() {
        return Err(AppError::new(
            ErrorCode::InvalidImageOrder,
            "liste d'images vide",
        ));
    }

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    load_owned_annonce(&mut conn, annonce_id, user.id)?;

    let owned: Vec<Uuid> = images::table
        .filter(images::annonce_id.eq(annonce_id))
        .select(images::id)
        .load(&mut conn)?;

    if req.image_ids.iter().any(|id| !owned.contains(id)) {
        return Err(AppError::new(
            ErrorCode::InvalidImageOrder,
            "une image n'appartient pas à cette annonce",
        ));
    }

    conn.transaction::<(), diesel::result::Error, _>(|conn| {
        for (position, image_id) in req.image_ids.iter().enumerate() {
            diesel::update(images::table.find(image_id))
                .set(images::ordre.eq(position as i32 + 1))
                .execute(conn)?;
        }
        Ok(())
    })?;

    let reordered: Vec<Image> = images::table
        .filter(images::annonce_id.eq(annonce_id))
        .order(images::ordre.asc())
        .load(&mut conn)?;

    Ok(Json(ApiResponse::ok_with_message(reordered, "ordre mis à jour")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_batch_starts_at_one() {
        assert_eq!(continuation_ordre(0, 0), 1);
        assert_eq!(continuation_ordre(0, 1), 2);
        assert_eq!(continuation_ordre(0, 2), 3);
    }

    #[test]
    fn later_batch_continues_after_existing_positions() {
        // Two images already present at positions 1 and 2; the next
        // upload must take 3, not collide with 2.
        assert_eq!(continuation_ordre(2, 0), 3);
        assert_eq!(continuation_ordre(2, 1), 4);
    }
}
