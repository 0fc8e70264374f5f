use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use axum_extra::extract::cookie::{Cookie, CookieJar};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    db::UserExt,
    error::{ErrorMessage, HttpError},
    models::{User, UserRole},
    utils::token,
};

/// Inserted into the request extensions once authentication succeeds, so
/// downstream handlers can extract the logged-in user without touching the
/// database again.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JWTAuthMiddleware {
    pub user: User,
}

/// Session middleware for every route behind a login.
///
/// Reads the JWT from the `auth_token` cookie first, then falls back to an
/// `Authorization: Bearer` header for non-browser clients. The subject claim
/// is the user's document id; the user is refetched on every request so role
/// changes and deletions take effect immediately.
///
/// A missing token gives 401. An invalid or expired token gives 403, and
/// the response carries an expired `auth_token` cookie so the browser drops
/// the dead session. A user gone from the database gives 401.
pub async fn auth(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let token = cookie_jar
        .get("auth_token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| {
                    auth_value
                        .strip_prefix("Bearer ")
                        .map(|token| token.to_owned())
                })
        });

    let token = token
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    let user_id_hex = match token::decode_token(token, app_state.env.jwt_secret.as_bytes()) {
        Ok(sub) => sub,
        Err(_) => return Ok(reject_dead_session()),
    };

    let user_id = match ObjectId::parse_str(&user_id_hex) {
        Ok(id) => id,
        Err(_) => return Ok(reject_dead_session()),
    };

    let user = app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let user =
        user.ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    req.extensions_mut().insert(JWTAuthMiddleware { user });

    Ok(next.run(req).await)
}

// 403 plus an expired auth_token cookie. A token that fails to decode will
// fail on every later request too, so the cookie gets cleared rather than
// letting the client retry it forever.
fn reject_dead_session() -> Response {
    let expired = Cookie::build(("auth_token", ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .http_only(true)
        .build();

    let mut response = HttpError::new(
        ErrorMessage::InvalidToken.to_string(),
        StatusCode::FORBIDDEN,
    )
    .into_response();

    if let Ok(value) = expired.to_string().parse() {
        response.headers_mut().append(header::SET_COOKIE, value);
    }

    response
}

/// Role gate layered on top of [`auth`]; admin-only routes pass
/// `vec![UserRole::Admin]`.
pub async fn role_check(
    req: Request,
    next: Next,
    required_roles: Vec<UserRole>,
) -> Result<impl IntoResponse, HttpError> {
    let user = req
        .extensions()
        .get::<JWTAuthMiddleware>()
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string()))?;

    if !required_roles.contains(&user.user.role) {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    Ok(next.run(req).await)
}
