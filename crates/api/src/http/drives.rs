use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde_json::{Value, json};
use twolane_contracts::{DriveSearch, DriveUpdate, NewDrive};
use twolane_policy::Guard;

use super::{
    ApiResult, AppState, caller, guard, invalid_params, json_error, parse_body, parse_path,
    store_error,
};

pub(super) async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<DriveSearch>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    guard(Guard::LoggedIn, caller(&state, &headers).as_ref())?;
    let Query(search) = query.map_err(|rejection| {
        json_error(
            StatusCode::BAD_REQUEST,
            "ERR_INVALID_PARAMS",
            format!("invalid query: {}", rejection.body_text()),
        )
    })?;

    let drives = state
        .store
        .search_drives(&search)
        .await
        .map_err(store_error)?;
    Ok(Json(json!({ "drives": drives })))
}

pub(super) async fn detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let title = parse_path(path)?;
    guard(Guard::LoggedIn, caller(&state, &headers).as_ref())?;

    let drive = state.store.get_drive(&title).await.map_err(store_error)?;
    Ok(Json(json!({ "drive": drive })))
}

pub(super) async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: Result<Json<NewDrive>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    guard(Guard::Admin, caller(&state, &headers).as_ref())?;
    let req = parse_body(req)?;
    req.validate().map_err(invalid_params)?;

    let drive = state.store.create_drive(&req).await.map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(json!({ "drive": drive }))))
}

pub(super) async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
    req: Result<Json<DriveUpdate>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let title = parse_path(path)?;
    guard(Guard::Admin, caller(&state, &headers).as_ref())?;
    let req = parse_body(req)?;
    req.validate().map_err(invalid_params)?;

    let drive = state
        .store
        .update_drive(&title, &req)
        .await
        .map_err(store_error)?;
    Ok(Json(json!({ "drive": drive })))
}

pub(super) async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let title = parse_path(path)?;
    guard(Guard::Admin, caller(&state, &headers).as_ref())?;

    state.store.remove_drive(&title).await.map_err(store_error)?;
    Ok(Json(json!({ "deleted": title })))
}
