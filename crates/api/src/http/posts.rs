use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use serde_json::{Value, json};
use twolane_auth::Principal;
use twolane_contracts::{NewPost, PostUpdate};
use twolane_policy::{DenyReason, Guard, author_scope};

use super::{
    ApiError, ApiResult, AppState, caller, guard, invalid_params, json_error, parse_body,
    parse_path, store_error,
};

fn logged_in(state: &AppState, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let principal = caller(state, headers);
    guard(Guard::LoggedIn, principal.as_ref())?;
    principal.ok_or_else(|| {
        json_error(
            StatusCode::UNAUTHORIZED,
            "ERR_UNAUTHORIZED",
            DenyReason::NotLoggedIn.as_str(),
        )
    })
}

pub(super) async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    logged_in(&state, &headers)?;

    let posts = state.store.all_posts().await.map_err(store_error)?;
    Ok(Json(json!({ "posts": posts })))
}

pub(super) async fn detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i32>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let post_id = parse_path(path)?;
    logged_in(&state, &headers)?;

    let post = state.store.get_post(post_id).await.map_err(store_error)?;
    Ok(Json(json!({ "post": post })))
}

pub(super) async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: Result<Json<NewPost>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let principal = logged_in(&state, &headers)?;
    let req = parse_body(req)?;
    req.validate().map_err(invalid_params)?;

    let post = state
        .store
        .create_post(&principal.username, &req)
        .await
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(json!({ "post": post }))))
}

pub(super) async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i32>, PathRejection>,
    req: Result<Json<PostUpdate>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let post_id = parse_path(path)?;
    let principal = logged_in(&state, &headers)?;
    let req = parse_body(req)?;
    req.validate().map_err(invalid_params)?;

    let post = state
        .store
        .update_post(post_id, &req, &author_scope(&principal))
        .await
        .map_err(store_error)?;
    Ok(Json(json!({ "post": post })))
}

pub(super) async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<i32>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let post_id = parse_path(path)?;
    let principal = logged_in(&state, &headers)?;

    state
        .store
        .remove_post(post_id, &author_scope(&principal))
        .await
        .map_err(store_error)?;
    Ok(Json(json!({ "deleted": post_id })))
}
