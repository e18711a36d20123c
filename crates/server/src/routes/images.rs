use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::header,
    middleware::from_fn_with_state,
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::{get, post},
};
use db::models::{
    image::{Image, ImageFilter, UpdateImage},
    user::User,
};
use services::services::generation::CaptionImage;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, middleware::load_image_middleware};

pub async fn get_images(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(filter): Query<ImageFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<Image>>>, ApiError> {
    let images = Image::find_for_user(&state.db().conn, user.id, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(images)))
}

pub async fn get_image(
    Extension(image): Extension<Image>,
) -> Result<ResponseJson<ApiResponse<Image>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(image)))
}

pub async fn update_image(
    State(state): State<AppState>,
    Extension(image): Extension<Image>,
    Json(payload): Json<UpdateImage>,
) -> Result<ResponseJson<ApiResponse<Image>>, ApiError> {
    let updated = Image::update(&state.db().conn, image.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

/// Hard delete: removes the database row and the file on disk. Any account
/// pointing at this image as its main image loses the pointer.
pub async fn delete_image(
    State(state): State<AppState>,
    Extension(image): Extension<Image>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let file_path = Image::hard_delete(&state.db().conn, image.id).await?;
    state.generation().storage().delete_file(&file_path).await;
    tracing::info!(image_id = %image.id, "deleted image");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn archive_image(
    State(state): State<AppState>,
    Extension(image): Extension<Image>,
) -> Result<ResponseJson<ApiResponse<Image>>, ApiError> {
    let archived = Image::soft_delete(&state.db().conn, image.id).await?;
    Ok(ResponseJson(ApiResponse::success(archived)))
}

pub async fn restore_image(
    State(state): State<AppState>,
    Extension(image): Extension<Image>,
) -> Result<ResponseJson<ApiResponse<Image>>, ApiError> {
    let restored = Image::restore(&state.db().conn, image.id).await?;
    Ok(ResponseJson(ApiResponse::success(restored)))
}

pub async fn get_image_file(Extension(image): Extension<Image>) -> Result<Response, ApiError> {
    let bytes = tokio::fs::read(&image.file_path)
        .await
        .map_err(|_| ApiError::NotFound("Image file not found".to_string()))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
}

pub async fn caption_image(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(image): Extension<Image>,
    Json(payload): Json<CaptionImage>,
) -> Result<ResponseJson<ApiResponse<Image>>, ApiError> {
    let captioned = state
        .generation()
        .caption_image(&state.db().conn, user.id, image.id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(captioned)))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let image_scoped = Router::new()
        .route(
            "/images/{image_id}",
            get(get_image).put(update_image).delete(delete_image),
        )
        .route("/images/{image_id}/archive", post(archive_image))
        .route("/images/{image_id}/restore", post(restore_image))
        .route("/images/{image_id}/file", get(get_image_file))
        .route("/images/{image_id}/caption", post(caption_image))
        .route_layer(from_fn_with_state(state.clone(), load_image_middleware));

    Router::new()
        .route("/images", get(get_images))
        .merge(image_scoped)
}
