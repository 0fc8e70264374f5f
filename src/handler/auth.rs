use crate::{
    AppState,
    db::{self, UserExt},
    dtos::{
        ForgotPasswordRequestDto, LoginUserDto, RegisterUserDto, ResetPasswordRequestDto,
        Response, UserLoginResponseDto, VerifyEmailQueryDto,
    },
    error::{ErrorMessage, HttpError},
    mail::mails::{send_forgot_password_email, send_verification_email, send_welcome_email},
    models::UserRole,
    utils::{password, token},
};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::Cookie;
use chrono::{Duration, Utc};
use mongodb::bson;
use tracing::instrument;
use validator::Validate;

/// Router for authentication endpoints
pub fn auth_handler() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/verify-email", get(verify_email))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

/// Create an unverified account and email the verification link.
#[instrument(skip(app_state, body), fields(username = %body.user_name, email = %body.email))]
pub async fn signup(
    State(app_state): State<AppState>,
    Json(body): Json<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid signup input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    // Validation already restricted the role to these two values.
    let role = match body.role.as_str() {
        "admin" => UserRole::Admin,
        _ => UserRole::User,
    };

    let verification_token = uuid::Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::hours(24);

    let hash_password = password::hash(&body.password).map_err(|e| {
        tracing::error!("Password hashing error: {}", e);
        HttpError::server_error(e.to_string())
    })?;

    let result = app_state
        .db_client
        .save_user(
            body.user_name.as_str(),
            body.email.as_str(),
            hash_password.as_str(),
            role,
            verification_token.as_str(),
            bson::DateTime::from_millis(expires_at.timestamp_millis()),
        )
        .await;

    match result {
        Ok(_user) => {
            let send_email_result = send_verification_email(
                &body.email,
                &body.user_name,
                &verification_token,
                &app_state.env.frontend_url,
            )
            .await;

            if let Err(e) = send_email_result {
                tracing::error!("Failed to send verification email: {}", e);
            }

            tracing::info!(username = %body.user_name, email = %body.email, "Signup successful");
            Ok((
                StatusCode::CREATED,
                Json(Response {
                    status: "success",
                    message:
                        "Registration successful! Please check your email to verify your account."
                            .to_string(),
                }),
            ))
        }
        Err(e) if db::is_duplicate_key_error(&e) => {
            tracing::error!("DB error, saving user, duplicate email: {}", e);
            Err(HttpError::unique_constraint_violation(
                "Email already in use".to_string(),
            ))
        }
        Err(e) => {
            tracing::error!("DB error, saving user: {}", e);
            Err(HttpError::server_error(
                ErrorMessage::ServerError.to_string(),
            ))
        }
    }
}

/// Verify credentials and hand out the session cookie.
#[instrument(skip(app_state, body), fields(email = %body.email))]
pub async fn login(
    State(app_state): State<AppState>,
    Json(body): Json<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid login input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let result = app_state
        .db_client
        .get_user(None, Some(&body.email), None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    // Same error for unknown email and wrong password.
    let user = result.ok_or_else(|| {
        tracing::error!("User not found");
        HttpError::forbidden(ErrorMessage::WrongCredentials.to_string())
    })?;

    let password_matched = password::compare(&body.password, &user.password).map_err(|e| {
        tracing::error!("Password comparison error: {}", e);
        HttpError::forbidden(ErrorMessage::WrongCredentials.to_string())
    })?;

    if !password_matched {
        tracing::error!("Password mismatch");
        return Err(HttpError::forbidden(
            ErrorMessage::WrongCredentials.to_string(),
        ));
    }

    let user_id = user.id.map(|id| id.to_hex()).unwrap_or_default();

    let auth_token = token::create_token(
        &user_id,
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let cookie = Cookie::build(("auth_token", auth_token.clone()))
        .path("/")
        .max_age(time::Duration::seconds(app_state.env.jwt_maxage))
        .http_only(true)
        .secure(true)
        .build();

    let json_response = Json(UserLoginResponseDto {
        status: "success".to_string(),
        token: auth_token,
        user_name: user.user_name,
    });

    let mut response = json_response.into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, cookie.to_string().parse().unwrap());

    tracing::info!(email = %body.email, "Login successful");
    Ok(response)
}

/// Drop the session cookie. Stateless tokens cannot be revoked, so this
/// only instructs the browser to forget it.
#[instrument]
pub async fn logout() -> Result<impl IntoResponse, HttpError> {
    let cookie = Cookie::build(("auth_token", ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .http_only(true)
        .build();

    let json_response = Json(Response {
        status: "success",
        message: "Logout successful".to_string(),
    });

    let mut response = json_response.into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, cookie.to_string().parse().unwrap());

    tracing::info!("Logout successful");
    Ok(response)
}

/// Redeem the emailed verification token; single use.
#[instrument(skip(app_state))]
pub async fn verify_email(
    Query(query_params): Query<VerifyEmailQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate().map_err(|e| {
        tracing::error!("Invalid verify email input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let result = app_state
        .db_client
        .get_user(None, None, Some(&query_params.token))
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let user = result.ok_or_else(|| {
        tracing::error!("User not found by verification token");
        HttpError::unauthorized(ErrorMessage::InvalidToken.to_string())
    })?;

    match user.token_expires_at {
        Some(expires_at) if bson::DateTime::now() <= expires_at => {}
        _ => {
            tracing::error!(user_id = %user.id.map(|id| id.to_hex()).unwrap_or_default(), "Verification token expired");
            return Err(HttpError::bad_request(
                ErrorMessage::InvalidToken.to_string(),
            ));
        }
    }

    app_state
        .db_client
        .redeem_verification_token(&query_params.token)
        .await
        .map_err(|e| {
            tracing::error!("DB error, redeeming verification token: {}", e);
            HttpError::server_error(e.to_string())
        })?;

    let send_welcome_email_result = send_welcome_email(&user.email, &user.user_name).await;

    if let Err(e) = send_welcome_email_result {
        tracing::error!("Failed to send welcome email: {}", e);
    }

    tracing::info!(email = %user.email, "Email verification successful");
    Ok(Json(Response {
        status: "success",
        message: "Email verification successful.".to_string(),
    }))
}

/// Store a 30-minute reset token and email the reset link.
#[instrument(skip(app_state), fields(email = %body.email))]
pub async fn forgot_password(
    State(app_state): State<AppState>,
    Json(body): Json<ForgotPasswordRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid forgot_password input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let result = app_state
        .db_client
        .get_user(None, Some(&body.email), None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let user = result.ok_or_else(|| {
        tracing::error!("Email not found");
        HttpError::bad_request("Email not found".to_string())
    })?;

    let user_id = user.id.ok_or_else(|| {
        tracing::error!("Stored user has no id");
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let verification_token = uuid::Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::minutes(30);

    app_state
        .db_client
        .set_verification_token(
            user_id,
            &verification_token,
            bson::DateTime::from_millis(expires_at.timestamp_millis()),
        )
        .await
        .map_err(|e| {
            tracing::error!("DB error, setting verification token: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let reset_link = format!(
        "{}/auth/reset-password?token={}",
        app_state.env.frontend_url, &verification_token
    );

    let email_sent = send_forgot_password_email(&user.email, &reset_link, &user.user_name).await;

    if let Err(e) = email_sent {
        tracing::error!("Failed to send forgot password email: {}", e);
        return Err(HttpError::server_error("Failed to send email".to_string()));
    }

    tracing::info!(email = %user.email, "Forgot password email sent");
    Ok(Json(Response {
        status: "success",
        message: "Password reset link has been sent to your email.".to_string(),
    }))
}

/// Redeem the reset token and store the new password hash.
#[instrument(skip(app_state, body))]
pub async fn reset_password(
    State(app_state): State<AppState>,
    Json(body): Json<ResetPasswordRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid reset_password input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let result = app_state
        .db_client
        .get_user(None, None, Some(&body.token))
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user by token: {}", e);
            HttpError::server_error(e.to_string())
        })?;

    let user = result.ok_or_else(|| {
        tracing::error!("User not found by reset token");
        HttpError::unauthorized(ErrorMessage::InvalidToken.to_string())
    })?;

    match user.token_expires_at {
        Some(expires_at) if bson::DateTime::now() <= expires_at => {}
        _ => {
            tracing::error!("Reset token expired");
            return Err(HttpError::bad_request(
                "Verification token has expired".to_string(),
            ));
        }
    }

    let user_id = user.id.ok_or_else(|| {
        tracing::error!("Stored user has no id");
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let hash_password = password::hash(&body.new_password).map_err(|e| {
        tracing::error!("Password hashing error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    app_state
        .db_client
        .update_user_password(user_id, hash_password)
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating user password: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    app_state
        .db_client
        .clear_verification_token(user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, clearing verification token: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!(email = %user.email, "Password reset successful");
    Ok(Json(Response {
        status: "success",
        message: "Password has been successfully reset.".to_string(),
    }))
}
