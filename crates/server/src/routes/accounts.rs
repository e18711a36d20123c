use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::{
    account::{Account, AccountWithMainImage, CreateAccount, UpdateAccount},
    image::Image,
    user::User,
};
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::load_account_middleware};

pub async fn get_accounts(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<ResponseJson<ApiResponse<Vec<Account>>>, ApiError> {
    let accounts = Account::find_all_for_user(&state.db().conn, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(accounts)))
}

pub async fn create_account(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateAccount>,
) -> Result<ResponseJson<ApiResponse<Account>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    tracing::debug!("Creating account '{}'", payload.name);

    let account = Account::create(&state.db().conn, user.id, &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(account)))
}

pub async fn get_account(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(account): Extension<Account>,
) -> Result<ResponseJson<ApiResponse<AccountWithMainImage>>, ApiError> {
    let detail = Account::with_main_image(&state.db().conn, account.id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

pub async fn update_account(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Json(payload): Json<UpdateAccount>,
) -> Result<ResponseJson<ApiResponse<Account>>, ApiError> {
    if let Some(name) = &payload.name {
        if name.trim().is_empty() {
            return Err(ApiError::BadRequest("name must not be empty".to_string()));
        }
    }
    let updated = Account::update(&state.db().conn, account.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let file_paths = Account::delete(&state.db().conn, account.id).await?;
    state.generation().storage().delete_files(&file_paths).await;
    tracing::info!(account_id = %account.id, images = file_paths.len(), "deleted account");
    Ok(ResponseJson(ApiResponse::success(())))
}

#[derive(Debug, Deserialize, TS)]
pub struct SetMainImageRequest {
    pub image_id: Uuid,
}

pub async fn set_main_image(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(account): Extension<Account>,
    Json(payload): Json<SetMainImageRequest>,
) -> Result<ResponseJson<ApiResponse<Account>>, ApiError> {
    Account::set_main_image(&state.db().conn, account.id, payload.image_id).await?;
    let updated = Account::find_by_id_for_user(&state.db().conn, account.id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub async fn generate_base(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(account): Extension<Account>,
    Json(payload): Json<services::services::generation::GenerateBaseImage>,
) -> Result<ResponseJson<ApiResponse<Image>>, ApiError> {
    let image = state
        .generation()
        .generate_base(&state.db().conn, user.id, Some(account.id), &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(image)))
}

pub async fn generate_derived(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(account): Extension<Account>,
    Json(payload): Json<services::services::generation::GenerateDerivedImage>,
) -> Result<ResponseJson<ApiResponse<Image>>, ApiError> {
    let image = state
        .generation()
        .generate_derived(&state.db().conn, user.id, account.id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(image)))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let account_scoped = Router::new()
        .route(
            "/accounts/{account_id}",
            get(get_account).put(update_account).delete(delete_account),
        )
        .route("/accounts/{account_id}/main-image", put(set_main_image))
        .route("/accounts/{account_id}/generate/base", post(generate_base))
        .route(
            "/accounts/{account_id}/generate/derived",
            post(generate_derived),
        )
        .route_layer(from_fn_with_state(state.clone(), load_account_middleware));

    Router::new()
        .route("/accounts", get(get_accounts).post(create_account))
        .merge(account_scoped)
}
