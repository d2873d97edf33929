use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use twolane_auth::Principal;
use twolane_contracts::{LoginRequest, RegisterRequest, TokenResponse};

use super::{AppState, invalid_params, issue_token, json_error, parse_body, store_error};

fn throttle(state: &AppState, username: &str) -> Result<(), Response> {
    state
        .auth_limiter
        .check(&format!("auth:{}", username))
        .map_err(|retry_after| {
            tracing::info!(username, "auth attempt rate limited");
            let mut headers = HeaderMap::new();
            let secs = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                headers.insert(header::RETRY_AFTER, value);
            }
            (
                headers,
                json_error(
                    StatusCode::TOO_MANY_REQUESTS,
                    "ERR_RATE_LIMITED",
                    "too many attempts, try again later",
                ),
            )
                .into_response()
        })
}

pub(super) async fn token(
    State(state): State<AppState>,
    req: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, Response> {
    let req = parse_body(req).map_err(IntoResponse::into_response)?;
    req.validate()
        .map_err(|reason| invalid_params(reason).into_response())?;
    throttle(&state, &req.username)?;

    let user = state
        .store
        .authenticate(&req.username, &req.password)
        .await
        .map_err(|err| store_error(err).into_response())?;

    let token = issue_token(&state, &Principal::new(user.username, user.is_admin))
        .map_err(IntoResponse::into_response)?;
    Ok(Json(TokenResponse { token }))
}

pub(super) async fn register(
    State(state): State<AppState>,
    req: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenResponse>), Response> {
    let req = parse_body(req).map_err(IntoResponse::into_response)?;
    req.validate()
        .map_err(|reason| invalid_params(reason).into_response())?;
    throttle(&state, &req.username)?;

    let user = state
        .store
        .register(&req.into_new_user())
        .await
        .map_err(|err| store_error(err).into_response())?;

    let token = issue_token(&state, &Principal::new(user.username, user.is_admin))
        .map_err(IntoResponse::into_response)?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}
