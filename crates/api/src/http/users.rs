use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use serde_json::{Value, json};
use twolane_auth::Principal;
use twolane_contracts::{NewUser, UserCars, UserDetail, UserDrives, UserPosts, UserUpdate};
use twolane_policy::Guard;

use super::{
    ApiResult, AppState, caller, guard, invalid_params, issue_token, parse_body, parse_path,
    store_error,
};

pub(super) async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    guard(Guard::Admin, caller(&state, &headers).as_ref())?;

    let users = state.store.find_all_users().await.map_err(store_error)?;
    Ok(Json(json!({ "users": users })))
}

pub(super) async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    guard(Guard::Admin, caller(&state, &headers).as_ref())?;
    let req = parse_body(req)?;
    req.validate().map_err(invalid_params)?;

    let user = state.store.register(&req).await.map_err(store_error)?;
    let token = issue_token(&state, &Principal::new(user.username.clone(), user.is_admin))?;
    Ok((StatusCode::CREATED, Json(json!({ "user": user, "token": token }))))
}

pub(super) async fn detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<UserDetail>> {
    let username = parse_path(path)?;
    guard(
        Guard::CorrectUserOrAdmin { target: &username },
        caller(&state, &headers).as_ref(),
    )?;

    Ok(Json(state.store.get_user(&username).await.map_err(store_error)?))
}

pub(super) async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
    req: Result<Json<UserUpdate>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let username = parse_path(path)?;
    let principal = caller(&state, &headers);
    guard(Guard::CorrectUserOrAdmin { target: &username }, principal.as_ref())?;

    let req = parse_body(req)?;
    if !req.is_admin.is_absent() {
        guard(Guard::Admin, principal.as_ref())?;
    }
    req.validate().map_err(invalid_params)?;

    let user = state
        .store
        .update_user(&username, &req)
        .await
        .map_err(store_error)?;
    Ok(Json(json!({ "user": user })))
}

pub(super) async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let username = parse_path(path)?;
    guard(
        Guard::CorrectUserOrAdmin { target: &username },
        caller(&state, &headers).as_ref(),
    )?;

    state.store.remove_user(&username).await.map_err(store_error)?;
    Ok(Json(json!({ "deleted": username })))
}

pub(super) async fn cars(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<UserCars>> {
    let username = parse_path(path)?;
    guard(
        Guard::CorrectUserOrAdmin { target: &username },
        caller(&state, &headers).as_ref(),
    )?;

    Ok(Json(state.store.user_cars(&username).await.map_err(store_error)?))
}

pub(super) async fn drives(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<UserDrives>> {
    let username = parse_path(path)?;
    guard(
        Guard::CorrectUserOrAdmin { target: &username },
        caller(&state, &headers).as_ref(),
    )?;

    Ok(Json(state.store.user_drives(&username).await.map_err(store_error)?))
}

pub(super) async fn posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<UserPosts>> {
    let username = parse_path(path)?;
    guard(
        Guard::CorrectUserOrAdmin { target: &username },
        caller(&state, &headers).as_ref(),
    )?;

    Ok(Json(state.store.user_posts(&username).await.map_err(store_error)?))
}

pub(super) async fn join_drive(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<(String, i32)>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let (username, drive_id) = parse_path(path)?;
    guard(
        Guard::CorrectUserOrAdmin { target: &username },
        caller(&state, &headers).as_ref(),
    )?;

    state
        .store
        .join_drive(&username, drive_id)
        .await
        .map_err(store_error)?;
    Ok(Json(json!({ "joined": drive_id })))
}

pub(super) async fn leave_drive(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<(String, i32)>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let (username, drive_id) = parse_path(path)?;
    guard(
        Guard::CorrectUserOrAdmin { target: &username },
        caller(&state, &headers).as_ref(),
    )?;

    state
        .store
        .leave_drive(&username, drive_id)
        .await
        .map_err(store_error)?;
    Ok(Json(json!({ "left": drive_id })))
}
