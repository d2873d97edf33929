use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use serde_json::{Value, json};
use twolane_contracts::{CarUpdate, NewCar};
use twolane_policy::Guard;

use super::{
    ApiResult, AppState, caller, guard, invalid_params, parse_body, parse_path, store_error,
};

pub(super) async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let username = parse_path(path)?;
    guard(Guard::LoggedIn, caller(&state, &headers).as_ref())?;

    let cars = state.store.cars_for(&username).await.map_err(store_error)?;
    Ok(Json(json!({ "cars": cars })))
}

pub(super) async fn detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<(String, i32)>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let (username, car_id) = parse_path(path)?;
    guard(Guard::LoggedIn, caller(&state, &headers).as_ref())?;

    let car = state
        .store
        .car_for(&username, car_id)
        .await
        .map_err(store_error)?;
    Ok(Json(json!({ "car": car })))
}

pub(super) async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
    req: Result<Json<NewCar>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let username = parse_path(path)?;
    guard(
        Guard::CorrectUserOrAdmin { target: &username },
        caller(&state, &headers).as_ref(),
    )?;
    let req = parse_body(req)?;
    req.validate().map_err(invalid_params)?;

    let car = state
        .store
        .add_car(&username, &req)
        .await
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(json!({ "car": car }))))
}

pub(super) async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<(String, i32)>, PathRejection>,
    req: Result<Json<CarUpdate>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let (username, car_id) = parse_path(path)?;
    guard(
        Guard::CorrectUserOrAdmin { target: &username },
        caller(&state, &headers).as_ref(),
    )?;
    let req = parse_body(req)?;
    req.validate().map_err(invalid_params)?;

    let car = state
        .store
        .update_car(&username, car_id, &req)
        .await
        .map_err(store_error)?;
    Ok(Json(json!({ "car": car })))
}

pub(super) async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<(String, i32)>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let (username, car_id) = parse_path(path)?;
    guard(
        Guard::CorrectUserOrAdmin { target: &username },
        caller(&state, &headers).as_ref(),
    )?;

    state
        .store
        .remove_car(&username, car_id)
        .await
        .map_err(store_error)?;
    Ok(Json(json!({ "deleted": car_id })))
}
