//! Authentication Handlers
//!
//! Registration with email OTP, password login, password reset and the
//! signed-in user's own profile.

use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::response::ApiResponse;
use shared::util::normalize_email;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::auth::password::{hash_password_async, verify_password_async};
use crate::core::ServerState;
use crate::db::models::{OtpPurpose, ShippingAddress, User, UserProfileUpdate, UserRole};
use crate::db::repository::RepoError;
use crate::db::repository::user::NewUser;
use crate::security_log;
use crate::services::mailer::{EmailMessage, templates};
use crate::utils::validation::{
    MAX_NAME_LEN, MAX_SHORT_TEXT_LEN, validate_address, validate_optional_text, validate_password,
    validate_payload, validate_required_text,
};

/// Fixed delay for authentication to prevent timing attacks
const AUTH_FIXED_DELAY_MS: u64 = 200;

/// Same answer whether or not the address is known
const GENERIC_OTP_MESSAGE: &str = "If the account exists, a verification code has been sent";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 200, message = "Name is required (max 200 characters)"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<ShippingAddress>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: User,
    /// Minutes until the emailed code expires
    pub otp_expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

fn issue_token(state: &ServerState, user: User) -> AppResult<AuthResponse> {
    let token = state
        .jwt_service
        .generate_token(&user)
        .map_err(|e| AppError::internal(format!("Failed to generate token: {e}")))?;
    Ok(AuthResponse { token, user })
}

/// Issue a code and queue it by mail
async fn send_code(state: &ServerState, user: &User, purpose: OtpPurpose) -> AppResult<()> {
    let code = state.otp.issue(&user.email, purpose).await?;
    let subject = match purpose {
        OtpPurpose::VerifyEmail => "Verify your email",
        OtpPurpose::ResetPassword => "Reset your password",
    };
    state.notify(EmailMessage::new(
        &user.email,
        format!("{} - {}", state.shop_name(), subject),
        templates::otp_code(
            state.shop_name(),
            &user.name,
            &code,
            state.otp.ttl_minutes(),
            purpose == OtpPurpose::ResetPassword,
        ),
    ));
    Ok(())
}

async fn load_user(state: &ServerState, id: &str) -> AppResult<User> {
    state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound))
}

/// POST /api/auth/register - 创建账户并发送邮箱验证码
pub async fn register(
    State(state): State<ServerState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<RegisterResponse>>)> {
    validate_payload(&req)?;
    validate_password(&req.password)?;
    let email = normalize_email(&req.email);

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::new(ErrorCode::EmailAlreadyRegistered));
    }

    let password_hash = hash_password_async(req.password).await?;
    let user = state
        .users
        .create(NewUser {
            name: req.name.trim().to_string(),
            email,
            password_hash,
            role: UserRole::User,
            is_verified: false,
        })
        .await
        .map_err(|e| match e {
            RepoError::Duplicate(_) => AppError::new(ErrorCode::EmailAlreadyRegistered),
            other => other.into(),
        })?;

    send_code(&state, &user, OtpPurpose::VerifyEmail).await?;
    tracing::info!(user_id = %user.key(), email = %user.email, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            RegisterResponse {
                user,
                otp_expires_in: state.otp.ttl_minutes(),
            },
            "Registration successful, check your email for the verification code",
        )),
    ))
}

/// POST /api/auth/verify-otp - 验证邮箱并返回令牌
pub async fn verify_otp(
    State(state): State<ServerState>,
    Json(req): Json<VerifyOtpRequest>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let email = normalize_email(&req.email);
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::VerificationCodeInvalid))?;

    if let Err(e) = state.otp.verify(&email, OtpPurpose::VerifyEmail, &req.code).await {
        security_log!("WARN", "otp_failed", email = email.clone(), code = e.code.code());
        return Err(e);
    }

    let user = if user.is_verified {
        user
    } else {
        state.users.mark_verified(&user.key()).await?
    };
    tracing::info!(user_id = %user.key(), "Email verified");

    Ok(Json(ApiResponse::success(issue_token(&state, user)?)))
}

/// POST /api/auth/resend-otp - 重新发送邮箱验证码
pub async fn resend_otp(
    State(state): State<ServerState>,
    Json(req): Json<EmailRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    validate_payload(&req)?;
    let email = normalize_email(&req.email);

    if let Some(user) = state.users.find_by_email(&email).await? {
        if user.is_verified {
            return Err(AppError::with_message(
                ErrorCode::InvalidRequest,
                "Email is already verified",
            ));
        }
        send_code(&state, &user, OtpPurpose::VerifyEmail).await?;
    }

    Ok(Json(ApiResponse::ok_message(GENERIC_OTP_MESSAGE)))
}

/// POST /api/auth/login - 邮箱密码登录
///
/// Unverified accounts may sign in; placing orders still requires a
/// verified email.
pub async fn login(
    State(state): State<ServerState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    validate_payload(&req)?;
    let email = normalize_email(&req.email);

    let user = state.users.find_by_email(&email).await?;

    // Fixed delay to prevent timing attacks (before checking result)
    tokio::time::sleep(Duration::from_millis(AUTH_FIXED_DELAY_MS)).await;

    let user = match user {
        Some(user) => {
            let valid = verify_password_async(req.password, user.password_hash.clone()).await;
            if !valid {
                security_log!(
                    "WARN",
                    "login_failed",
                    email = email.clone(),
                    reason = "invalid_credentials"
                );
                return Err(AppError::invalid_credentials());
            }
            user
        }
        None => {
            security_log!(
                "WARN",
                "login_failed",
                email = email.clone(),
                reason = "user_not_found"
            );
            return Err(AppError::invalid_credentials());
        }
    };

    tracing::info!(
        user_id = %user.key(),
        role = user.role.as_str(),
        "User logged in successfully"
    );
    Ok(Json(ApiResponse::success(issue_token(&state, user)?)))
}

/// POST /api/auth/forgot-password - 发送重置密码验证码
pub async fn forgot_password(
    State(state): State<ServerState>,
    Json(req): Json<EmailRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    validate_payload(&req)?;
    let email = normalize_email(&req.email);

    match state.users.find_by_email(&email).await? {
        Some(user) => send_code(&state, &user, OtpPurpose::ResetPassword).await?,
        None => tracing::debug!(email = %email, "Password reset for unknown email"),
    }

    Ok(Json(ApiResponse::ok_message(GENERIC_OTP_MESSAGE)))
}

/// POST /api/auth/reset-password - 用验证码设置新密码
pub async fn reset_password(
    State(state): State<ServerState>,
    Json(req): Json<ResetPasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    validate_password(&req.password)?;
    let email = normalize_email(&req.email);

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::VerificationCodeInvalid))?;

    if let Err(e) = state.otp.verify(&email, OtpPurpose::ResetPassword, &req.code).await {
        security_log!("WARN", "otp_failed", email = email.clone(), code = e.code.code());
        return Err(e);
    }

    let password_hash = hash_password_async(req.password).await?;
    state.users.update_password(&user.key(), password_hash).await?;
    // Receiving the code proves ownership of the mailbox
    if !user.is_verified {
        state.users.mark_verified(&user.key()).await?;
    }
    security_log!("INFO", "password_reset", user_id = user.key());

    Ok(Json(ApiResponse::ok_message("Password has been reset")))
}

/// GET /api/auth/me - 当前用户资料
pub async fn me(
    State(state): State<ServerState>,
    current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = load_user(&state, &current_user.id).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// PUT /api/auth/me - 更新姓名、电话、默认地址
pub async fn update_me(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    if let Some(name) = &req.name {
        validate_required_text(name, "name", MAX_NAME_LEN)?;
    }
    validate_optional_text(&req.phone, "phone", MAX_SHORT_TEXT_LEN)?;
    if let Some(address) = &req.address {
        validate_address(address)?;
    }

    load_user(&state, &current_user.id).await?;
    let user = state
        .users
        .update_profile(
            &current_user.id,
            UserProfileUpdate {
                name: req.name.map(|n| n.trim().to_string()),
                phone: req.phone.map(|p| p.trim().to_string()),
                address: req.address,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(user)))
}

/// PUT /api/auth/password - 修改密码 (需要当前密码)
pub async fn change_password(
    State(state): State<ServerState>,
    current_user: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    validate_password(&req.new_password)?;
    let user = load_user(&state, &current_user.id).await?;

    if !verify_password_async(req.current_password, user.password_hash.clone()).await {
        security_log!("WARN", "password_change_failed", user_id = user.key());
        return Err(AppError::with_message(
            ErrorCode::InvalidCredentials,
            "Current password is incorrect",
        ));
    }

    let password_hash = hash_password_async(req.new_password).await?;
    state.users.update_password(&user.key(), password_hash).await?;
    security_log!("INFO", "password_changed", user_id = user.key());

    Ok(Json(ApiResponse::ok_message("Password updated")))
}
