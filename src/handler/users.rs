use std::collections::{HashMap, HashSet};

use crate::{
    AppState,
    db::{BookExt, CommentExt, ReviewExt, UserExt},
    dtos::{
        DoubleCheckDto, FilterUserDto, ProfileCommentDto, ProfileReviewDto, Response, UserData,
        UserPasswordUpdateDto, UserProfileDto, UserProfileResponseDto, UserResponseDto,
    },
    error::{ErrorMessage, HttpError},
    middleware::{JWTAuthMiddleware, auth},
    models::{Review, User},
    utils::password,
};
use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, put},
};
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use tracing::instrument;
use validator::Validate;

/// Avatar uploads above this size are rejected at the body-limit layer.
const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Stored avatars are served from this prefix by the static file route.
const AVATAR_PUBLIC_PREFIX: &str = "/uploads/profile-pictures";

/// Router for user profile endpoints
pub fn users_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/profile/{user_id}", get(get_user_profile))
        .route(
            "/profile",
            get(get_my_profile)
                .delete(delete_me)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/profile",
            put(update_profile)
                .layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES))
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/password",
            put(update_user_password)
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

/// Assemble the public profile shape: identity fields plus owned reviews and
/// comments, resolved through the back-reference lists on the user document.
async fn build_profile(app_state: &AppState, user: &User) -> Result<UserProfileDto, HttpError> {
    let reviews = app_state
        .db_client
        .get_reviews_by_ids(&user.reviews)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting profile reviews: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let comments = app_state
        .db_client
        .get_comments_by_ids(&user.comments)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting profile comments: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    // Join each comment with its parent review's title. A parent deleted
    // since the comment was written simply yields no reference.
    let parent_ids: Vec<ObjectId> = comments.iter().map(|c| c.review_id).collect();
    let parent_reviews = app_state
        .db_client
        .get_reviews_by_ids(&parent_ids)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting parent reviews: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    let parents: HashMap<ObjectId, &Review> = parent_reviews
        .iter()
        .filter_map(|r| r.id.map(|id| (id, r)))
        .collect();

    Ok(UserProfileDto {
        id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
        user_name: user.user_name.to_owned(),
        bio: user.bio.to_owned(),
        profile_picture: user.profile_picture.to_owned(),
        reviews: reviews.iter().map(ProfileReviewDto::from_model).collect(),
        comments: comments
            .iter()
            .map(|c| ProfileCommentDto::from_model(c, parents.get(&c.review_id).copied()))
            .collect(),
    })
}

/// Caller's own profile.
#[instrument(skip(user, app_state), fields(username = %user.user.user_name))]
pub async fn get_my_profile(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let profile = build_profile(&app_state, &user.user).await?;

    tracing::info!("get_my_profile successful");
    Ok(Json(UserProfileResponseDto {
        status: "success".to_string(),
        data: profile,
    }))
}

/// Any user's profile, by id. Public.
#[instrument(skip(app_state))]
pub async fn get_user_profile(
    Path(user_id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = ObjectId::parse_str(&user_id)
        .map_err(|_| HttpError::bad_request("Invalid user ID".to_string()))?;

    let user = app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("User not found".to_string()))?;

    let profile = build_profile(&app_state, &user).await?;

    tracing::info!("get_user_profile successful");
    Ok(Json(UserProfileResponseDto {
        status: "success".to_string(),
        data: profile,
    }))
}

/// Update bio and/or avatar from a multipart form.
///
/// Accepts an optional `bio` text field and an optional `profilePicture`
/// file field. A new avatar is written under the upload directory with a
/// generated name and the previous file is removed; the stored value is the
/// public URL path, not the disk path.
#[instrument(skip(app_state, user, multipart), fields(username = %user.user.user_name))]
pub async fn update_profile(
    State(app_state): State<AppState>,
    Extension(user): Extension<JWTAuthMiddleware>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let user = user.user;
    let user_id = user.id.ok_or_else(|| {
        tracing::error!("Stored user has no id");
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let mut bio: Option<String> = None;
    let mut picture_path: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Multipart error: {}", e);
        HttpError::bad_request(e.to_string())
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "bio" => {
                let text = field.text().await.map_err(|e| {
                    tracing::error!("Multipart error, reading bio: {}", e);
                    HttpError::bad_request(e.to_string())
                })?;
                bio = Some(text);
            }
            "profilePicture" => {
                let ext = field
                    .file_name()
                    .and_then(|name| std::path::Path::new(name).extension())
                    .and_then(|ext| ext.to_str())
                    .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
                    .unwrap_or_default();

                let data = field.bytes().await.map_err(|e| {
                    tracing::error!("Multipart error, reading file: {}", e);
                    HttpError::bad_request(e.to_string())
                })?;
                if data.is_empty() {
                    continue;
                }

                let file_name = format!(
                    "profilePicture-{}-{}{}",
                    Utc::now().timestamp_millis(),
                    uuid::Uuid::new_v4(),
                    ext
                );
                let disk_path = format!("{}/{}", app_state.env.upload_dir, file_name);

                tokio::fs::write(&disk_path, &data).await.map_err(|e| {
                    tracing::error!("Failed to store uploaded file: {}", e);
                    HttpError::server_error("Failed to store uploaded file".to_string())
                })?;

                picture_path = Some(format!("{}/{}", AVATAR_PUBLIC_PREFIX, file_name));
            }
            _ => {}
        }
    }

    // The replaced avatar is dead weight on disk; dropping it is best effort.
    if picture_path.is_some() {
        if let Some(old_path) = &user.profile_picture {
            if let Err(e) = tokio::fs::remove_file(format!("public{}", old_path)).await {
                tracing::warn!("Failed to remove old profile picture: {}", e);
            }
        }
    }

    let updated = app_state
        .db_client
        .update_profile(user_id, bio, picture_path)
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating profile: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("User not found".to_string()))?;

    tracing::info!("update_profile successful");
    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(&updated),
        },
    }))
}

/// Change the caller's password after re-checking the old one.
#[instrument(skip(app_state, user, body), fields(username = %user.user.user_name))]
pub async fn update_user_password(
    State(app_state): State<AppState>,
    Extension(user): Extension<JWTAuthMiddleware>,
    Json(body): Json<UserPasswordUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid update_user_password input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let user = user.user;
    let user_id = user.id.ok_or_else(|| {
        tracing::error!("Stored user has no id");
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let password_match = password::compare(&body.old_password, &user.password).map_err(|e| {
        tracing::error!("Password comparison error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    if !password_match {
        tracing::error!("Old password is incorrect");
        return Err(HttpError::bad_request(
            "Old password is incorrect".to_string(),
        ));
    }

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

    tracing::info!("update_user_password successful");
    Ok(Json(Response {
        status: "success",
        message: "Password updated Successfully".to_string(),
    }))
}

/// Password-confirmed account deletion.
///
/// Removes the account and everything it owns: comments are pulled from
/// their parent reviews, reviews are pulled from their books, and each
/// affected book's average rating is recomputed from the reviews that
/// remain. Files and cross-document pulls are best effort; the deletes are
/// not transactional.
#[instrument(skip(app_state, jwt, body), fields(username = %jwt.user.user_name))]
pub async fn delete_me(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<DoubleCheckDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid delete_me input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let user = jwt.user;
    let user_id = user.id.ok_or_else(|| {
        tracing::error!("Stored user has no id");
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let passwords_match = password::compare(&body.password, &user.password).map_err(|e| {
        tracing::error!("Password comparison error: {}", e);
        HttpError::server_error("Error while comparing passwords".to_string())
    })?;

    if !passwords_match {
        tracing::error!("Invalid password for delete_me");
        return Err(HttpError::unauthorized("Invalid password".to_string()));
    }

    // Comments first: pull each from its parent review, then drop them.
    let comments = app_state
        .db_client
        .get_comments_by_user(user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user comments: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    for comment in &comments {
        if let Some(comment_id) = comment.id {
            if let Err(e) = app_state
                .db_client
                .pull_review_comment(comment.review_id, comment_id)
                .await
            {
                tracing::warn!("Failed to pull comment from review: {}", e);
            }
        }
    }

    app_state
        .db_client
        .delete_comments_by_user(user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, deleting user comments: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    // Reviews next: pull from books, delete, then recompute the averages
    // of every book that lost a review.
    let reviews = app_state
        .db_client
        .get_reviews_by_user(user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user reviews: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let mut touched_books = HashSet::new();
    for review in &reviews {
        touched_books.insert(review.book_id);
        if let Some(review_id) = review.id {
            if let Err(e) = app_state
                .db_client
                .pull_book_review(review.book_id, review_id)
                .await
            {
                tracing::warn!("Failed to pull review from book: {}", e);
            }
        }
    }

    app_state
        .db_client
        .delete_reviews_by_user(user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, deleting user reviews: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    for book_id in touched_books {
        if let Err(e) = app_state.db_client.recalculate_book_rating(book_id).await {
            tracing::warn!("Failed to recalculate book rating: {}", e);
        }
    }

    if let Some(picture) = &user.profile_picture {
        if let Err(e) = tokio::fs::remove_file(format!("public{}", picture)).await {
            tracing::warn!("Failed to remove profile picture: {}", e);
        }
    }

    app_state
        .db_client
        .delete_user(user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, deleting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!("delete_me successful");
    Ok(StatusCode::NO_CONTENT)
}
