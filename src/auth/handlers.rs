use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            ForgotPasswordRequest, LoginRequest, MessageResponse, PublicUser,
            ResetPasswordRequest, SignupRequest, UpdatePasswordRequest, UserData, UserResponse,
        },
        envelope::{logout_envelope, session_envelope},
        extractors::CurrentUser,
        service::CredentialService,
    },
    error::ApiError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/signup", post(signup))
        .route("/users/login", post(login))
        .route("/users/logout", get(logout))
        .route("/users/me", get(me))
        .route("/users/updateMyPassword", patch(update_my_password))
        .route("/users/forgotPassword", post(forgot_password))
        .route("/users/resetPassword/:token", patch(reset_password))
}

#[instrument(skip(state, payload))]
async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<Response, ApiError> {
    let service = CredentialService::from_ref(&state);
    let (user, token) = service
        .signup(
            &payload.name,
            &payload.email,
            &payload.password,
            &payload.password_confirm,
        )
        .await?;
    Ok(session_envelope(
        &user,
        token,
        StatusCode::CREATED,
        &state.config,
    ))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let service = CredentialService::from_ref(&state);
    let (user, token) = service.login(&payload.email, &payload.password).await?;
    Ok(session_envelope(&user, token, StatusCode::OK, &state.config))
}

async fn logout() -> Response {
    logout_envelope()
}

#[instrument(skip_all)]
async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse {
        status: "success",
        data: UserData {
            user: PublicUser::from(&user),
        },
    })
}

#[instrument(skip(state, payload, current))]
async fn update_my_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Response, ApiError> {
    let service = CredentialService::from_ref(&state);
    let (user, token) = service
        .change_password(
            &current.0,
            &payload.password_current,
            &payload.password,
            &payload.password_confirm,
        )
        .await?;
    Ok(session_envelope(&user, token, StatusCode::OK, &state.config))
}

#[instrument(skip(state, payload))]
async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let service = CredentialService::from_ref(&state);
    service.forgot_password(&payload.email).await?;
    Ok(Json(MessageResponse {
        status: "success",
        message: "password reset link sent to the provided email".into(),
    }))
}

#[instrument(skip(state, payload))]
async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Response, ApiError> {
    let service = CredentialService::from_ref(&state);
    let (user, session_token) = service
        .reset_password(&token, &payload.password, &payload.password_confirm)
        .await?;
    Ok(session_envelope(
        &user,
        session_token,
        StatusCode::OK,
        &state.config,
    ))
}
