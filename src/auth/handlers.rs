use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, MeResponse, RegisterRequest, RegisterResponse},
        extractors::AuthUser,
        jwt::JwtKeys,
        services,
    },
    error::{method_not_allowed, ApiJson, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register).fallback(method_not_allowed))
        .route("/auth/login", post(login).fallback(method_not_allowed))
        .route("/auth/me", get(get_me).fallback(method_not_allowed))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let keys = JwtKeys::from_ref(&state);
    let (token, user) = services::register(state.store.as_ref(), &keys, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered".into(),
            token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let (token, user) = services::login(state.store.as_ref(), &keys, payload).await?;
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn get_me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<MeResponse>> {
    let user = services::current_user(state.store.as_ref(), auth.id).await?;
    Ok(Json(MeResponse { user: user.into() }))
}
