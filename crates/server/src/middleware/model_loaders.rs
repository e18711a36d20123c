use std::{fmt::Display, future::Future};

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use db::models::{account::Account, image::Image, user::User};
use uuid::Uuid;

use crate::AppState;

async fn fetch_model_or_status<M, E, Fut>(
    model_name: &'static str,
    model_id: Uuid,
    load_future: Fut,
) -> Result<M, StatusCode>
where
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    match load_future.await {
        Ok(Some(model)) => Ok(model),
        Ok(None) => {
            tracing::warn!("{model_name} {model_id} not found");
            Err(StatusCode::NOT_FOUND)
        }
        Err(error) => {
            tracing::error!("Failed to fetch {model_name} {model_id}: {error}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn load_request_extension<M, E, Fut>(
    request: Request,
    next: Next,
    model_name: &'static str,
    model_id: Uuid,
    load_future: Fut,
) -> Result<Response, StatusCode>
where
    M: Clone + Send + Sync + 'static,
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    let model = fetch_model_or_status(model_name, model_id, load_future).await?;
    let mut request = request;
    request.extensions_mut().insert(model);
    Ok(next.run(request).await)
}

fn current_user(request: &Request) -> Result<User, StatusCode> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or(StatusCode::UNAUTHORIZED)
}

pub async fn load_account_middleware(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user = current_user(&request)?;
    load_request_extension(
        request,
        next,
        "Account",
        account_id,
        Account::find_by_id_for_user(&state.db().conn, account_id, user.id),
    )
    .await
}

pub async fn load_image_middleware(
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user = current_user(&request)?;
    load_request_extension(
        request,
        next,
        "Image",
        image_id,
        Image::find_by_id_for_user(&state.db().conn, image_id, user.id),
    )
    .await
}
