//! Account route handlers.
//!
//! Every response body is `{"message": ...}`, plus a `user` object where noted.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{AppError, Result, set_sentry_user};
use crate::models::user::{UserProfile, UserSummary};
use crate::services::auth::{
    AuthService, EmailRequest, ResetRequest, SigninRequest, SignupRequest, VerifyRequest,
};
use crate::state::AppState;

/// Plain message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Message plus the affected user.
#[derive(Debug, Serialize)]
pub struct UserResponse<U> {
    pub message: &'static str,
    pub user: U,
}

const fn message(message: &'static str) -> Json<MessageResponse> {
    Json(MessageResponse { message })
}

fn auth(state: &AppState) -> AuthService<'_> {
    AuthService::new(state.pool(), state.email())
}

/// Parse a JSON body, treating an empty body as an empty object.
fn parse_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|_| AppError::BadRequest("Invalid JSON body".to_string()))
}

/// `POST /api/signup`
pub async fn signup(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let req: SignupRequest = parse_json(&body)?;
    let user = auth(&state).signup(&req).await?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: "User registered successfully. OTP sent to email.",
            user: UserSummary::from(&user),
        }),
    ))
}

/// `GET /api/signup/resend-otp/{id}`
pub async fn resend_otp(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    auth(&state).resend_otp(&id).await?;
    Ok(message("OTP resent successfully"))
}

/// `POST /api/signup/verify/{id}`
pub async fn verify(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<UserResponse<UserSummary>>> {
    let req: VerifyRequest = parse_json(&body)?;
    let user = auth(&state).verify_signup(&id, &req).await?;

    Ok(Json(UserResponse {
        message: "Email verified successfully!",
        user: UserSummary::from(&user),
    }))
}

/// `POST /api/signin`
pub async fn signin(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<UserResponse<UserProfile>>> {
    let req: SigninRequest = parse_json(&body)?;
    let user = auth(&state).signin(&req).await?;

    set_sentry_user(&user.id, Some(user.email.as_str()));

    Ok(Json(UserResponse {
        message: "Login successful",
        user: UserProfile::from(&user),
    }))
}

/// `DELETE /api/signin/emailnotverified`
pub async fn delete_unverified(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageResponse>> {
    let req: EmailRequest = parse_json(&body)?;
    auth(&state).delete_unverified(&req).await?;
    Ok(message("Unverified user deleted successfully"))
}

/// `POST /api/signin/forgotpassword/auth`
pub async fn forgot_password(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageResponse>> {
    let req: EmailRequest = parse_json(&body)?;
    auth(&state).start_password_reset(&req).await?;
    Ok(message("Password reset OTP sent successfully"))
}

/// `POST /api/signin/forgotpassword/verify`
pub async fn verify_reset_code(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageResponse>> {
    let req: ResetRequest = parse_json(&body)?;
    auth(&state).verify_reset_code(&req).await?;
    Ok(message("OTP verified"))
}

/// `PATCH /api/signin/forgotpassword/reset`
pub async fn reset_password(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageResponse>> {
    let req: ResetRequest = parse_json(&body)?;
    auth(&state).reset_password(&req).await?;
    Ok(message("Password reset successful"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_empty_body_is_default() {
        let req: SigninRequest = parse_json(&Bytes::from_static(b"  \n")).unwrap();
        assert!(req.email.is_none());
    }

    #[test]
    fn test_parse_json_rejects_garbage() {
        let err = parse_json::<SigninRequest>(&Bytes::from_static(b"email=a")).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
