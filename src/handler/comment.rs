use std::collections::HashMap;

use crate::{
    AppState,
    db::{CommentExt, ReviewExt, UserExt},
    dtos::{
        CommentCreateDto, CommentDto, CommentListResponseDto, CommentUpdateDto,
        SingleCommentResponseDto, UserCommentDto, UserCommentListResponseDto,
    },
    error::{ErrorMessage, HttpError},
    middleware::{JWTAuthMiddleware, auth},
};
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use mongodb::bson::oid::ObjectId;
use tracing::instrument;
use validator::Validate;

pub fn comment_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/review/{review_id}", get(get_review_comments))
        .route(
            "/user",
            get(get_my_comments)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/{comment_id}", get(get_comment))
        .route(
            "/",
            post(create_comment)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/{comment_id}",
            put(update_comment)
                .delete(delete_comment)
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

/// Single comment with its author's name joined in.
#[instrument(skip(app_state))]
pub async fn get_comment(
    Path(comment_id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let comment_id = ObjectId::parse_str(&comment_id)
        .map_err(|_| HttpError::bad_request("Invalid comment ID".to_string()))?;

    let comment = app_state
        .db_client
        .get_comment(comment_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting comment: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Comment not found".to_string()))?;

    let author = app_state
        .db_client
        .get_user(Some(comment.user_id), None, None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting comment author: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(SingleCommentResponseDto {
        status: "success".to_string(),
        data: CommentDto::from_model(&comment, author.map(|u| u.user_name)),
    }))
}

/// All comments under one review, author names joined in.
#[instrument(skip(app_state))]
pub async fn get_review_comments(
    Path(review_id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let review_id = ObjectId::parse_str(&review_id)
        .map_err(|_| HttpError::bad_request("Invalid review ID".to_string()))?;

    app_state
        .db_client
        .get_review(review_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Review not found".to_string()))?;

    let comments = app_state
        .db_client
        .get_comments_by_review(review_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting review comments: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let user_ids: Vec<ObjectId> = comments.iter().map(|c| c.user_id).collect();
    let authors = app_state
        .db_client
        .get_users_by_ids(&user_ids)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting comment authors: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    let names: HashMap<ObjectId, String> = authors
        .iter()
        .filter_map(|u| u.id.map(|id| (id, u.user_name.clone())))
        .collect();

    let data: Vec<CommentDto> = comments
        .iter()
        .map(|c| CommentDto::from_model(c, names.get(&c.user_id).cloned()))
        .collect();

    tracing::info!(results = data.len(), "get_review_comments successful");
    Ok(Json(CommentListResponseDto {
        status: "success".to_string(),
        results: data.len(),
        data,
    }))
}

/// The caller's own comments, parent review titles joined in.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.user_name))]
pub async fn get_my_comments(
    Extension(jwt): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = jwt.user.id.ok_or_else(|| {
        tracing::error!("Stored user has no id");
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let comments = app_state
        .db_client
        .get_comments_by_user(user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user comments: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let review_ids: Vec<ObjectId> = comments.iter().map(|c| c.review_id).collect();
    let reviews = app_state
        .db_client
        .get_reviews_by_ids(&review_ids)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting parent reviews: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    let titles: HashMap<ObjectId, Option<String>> = reviews
        .iter()
        .filter_map(|r| r.id.map(|id| (id, r.title.clone())))
        .collect();

    let data: Vec<UserCommentDto> = comments
        .iter()
        .map(|c| {
            UserCommentDto::from_model(c, titles.get(&c.review_id).cloned().flatten())
        })
        .collect();

    tracing::info!(results = data.len(), "get_my_comments successful");
    Ok(Json(UserCommentListResponseDto {
        status: "success".to_string(),
        results: data.len(),
        data,
    }))
}

/// Comment on a review. The parent review must exist; the new id is pushed
/// to both the review's and the caller's back-reference lists.
#[instrument(skip(app_state, jwt, body), fields(username = %jwt.user.user_name))]
pub async fn create_comment(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<CommentCreateDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_comment input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let review_id = ObjectId::parse_str(&body.review_id)
        .map_err(|_| HttpError::bad_request("Invalid review ID".to_string()))?;
    let user_id = jwt.user.id.ok_or_else(|| {
        tracing::error!("Stored user has no id");
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    app_state
        .db_client
        .get_review(review_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Review not found".to_string()))?;

    let comment = app_state
        .db_client
        .save_comment(review_id, user_id, body.content)
        .await
        .map_err(|e| {
            tracing::error!("DB error, saving comment: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    let comment_id = comment.id.ok_or_else(|| {
        tracing::error!("Saved comment has no id");
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    app_state
        .db_client
        .push_review_comment(review_id, comment_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, linking comment to review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    app_state
        .db_client
        .push_user_comment(user_id, comment_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, linking comment to user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!("create_comment successful");
    Ok((
        StatusCode::CREATED,
        Json(SingleCommentResponseDto {
            status: "success".to_string(),
            data: CommentDto::from_model(&comment, Some(jwt.user.user_name)),
        }),
    ))
}

/// Owner-filtered update; a comment belonging to someone else looks the
/// same as a missing one.
#[instrument(skip(app_state, jwt, body), fields(username = %jwt.user.user_name))]
pub async fn update_comment(
    Path(comment_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<CommentUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    let comment_id = ObjectId::parse_str(&comment_id)
        .map_err(|_| HttpError::bad_request("Invalid comment ID".to_string()))?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid update_comment input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let user_id = jwt.user.id.ok_or_else(|| {
        tracing::error!("Stored user has no id");
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let comment = app_state
        .db_client
        .update_comment(comment_id, user_id, body.content)
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating comment: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| {
            HttpError::not_found("Comment not found or unauthorized".to_string())
        })?;

    tracing::info!("update_comment successful");
    Ok(Json(SingleCommentResponseDto {
        status: "success".to_string(),
        data: CommentDto::from_model(&comment, Some(jwt.user.user_name)),
    }))
}

/// Owner-filtered delete; the comment's id is pulled from both the parent
/// review's and the owner's back-reference lists.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.user_name))]
pub async fn delete_comment(
    Path(comment_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let comment_id = ObjectId::parse_str(&comment_id)
        .map_err(|_| HttpError::bad_request("Invalid comment ID".to_string()))?;

    let user_id = jwt.user.id.ok_or_else(|| {
        tracing::error!("Stored user has no id");
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let comment = app_state
        .db_client
        .delete_comment(comment_id, user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, deleting comment: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| {
            HttpError::not_found("Comment not found or unauthorized".to_string())
        })?;

    app_state
        .db_client
        .pull_review_comment(comment.review_id, comment_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, unlinking comment from review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    app_state
        .db_client
        .pull_user_comment(user_id, comment_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, unlinking comment from user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!("delete_comment successful");
    Ok(StatusCode::NO_CONTENT)
}
