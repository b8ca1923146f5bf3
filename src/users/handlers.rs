use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{patch, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, PublicUser, RegisterRequest, TokenResponse},
        services::{self as auth_service, AuthUser},
    },
    error::AppError,
    state::AppState,
    users::{repo::StatsPatch, services},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/login", post(login))
        .route("/users/registration", post(register))
        .route("/users/userstats", patch(update_stats).get(get_stats))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(v)| v).map_err(|e| {
        warn!(error = %e, "rejected request body");
        AppError::InvalidBody
    })
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = auth_service::login(state.store.as_ref(), &state.keys, body(payload)?).await?;
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let user = auth_service::register(state.store.as_ref(), body(payload)?).await?;
    let location = format!("/api/users/{}", user.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(PublicUser::from(user)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_stats(
    State(state): State<AppState>,
    who: AuthUser,
    payload: Result<Json<StatsPatch>, JsonRejection>,
) -> Result<Json<PublicUser>, AppError> {
    let user = services::update_stats(state.store.as_ref(), &who, body(payload)?).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn get_stats(
    State(state): State<AppState>,
    who: AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = services::current_user(state.store.as_ref(), &who).await?;
    Ok(Json(user.into()))
}
