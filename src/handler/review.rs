use std::collections::HashMap;

use crate::{
    AppState,
    db::{BookExt, ReviewExt, UserExt},
    dtos::{
        ReviewCreateDto, ReviewDto, ReviewListResponseDto, ReviewUpdateDto,
        SingleReviewResponseDto, UserReviewDto, UserReviewListResponseDto,
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

pub fn review_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/book/{book_id}", get(get_book_reviews))
        .route(
            "/user",
            get(get_my_reviews)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/{review_id}", get(get_review))
        .route(
            "/",
            post(create_review)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/{review_id}",
            put(update_review)
                .delete(delete_review)
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

/// Single review with its author's name joined in.
#[instrument(skip(app_state))]
pub async fn get_review(
    Path(review_id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let review_id = ObjectId::parse_str(&review_id)
        .map_err(|_| HttpError::bad_request("Invalid review ID".to_string()))?;

    let review = app_state
        .db_client
        .get_review(review_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Review not found".to_string()))?;

    let author = app_state
        .db_client
        .get_user(Some(review.user_id), None, None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting review author: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(SingleReviewResponseDto {
        status: "success".to_string(),
        data: ReviewDto::from_model(&review, author.map(|u| u.user_name)),
    }))
}

/// All reviews for one book, author names joined in.
#[instrument(skip(app_state))]
pub async fn get_book_reviews(
    Path(book_id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let book_id = ObjectId::parse_str(&book_id)
        .map_err(|_| HttpError::bad_request("Invalid book ID".to_string()))?;

    app_state
        .db_client
        .get_book(book_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting book: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Book not found".to_string()))?;

    let reviews = app_state
        .db_client
        .get_reviews_by_book(book_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting book reviews: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let user_ids: Vec<ObjectId> = reviews.iter().map(|r| r.user_id).collect();
    let authors = app_state
        .db_client
        .get_users_by_ids(&user_ids)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting review authors: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    let names: HashMap<ObjectId, String> = authors
        .iter()
        .filter_map(|u| u.id.map(|id| (id, u.user_name.clone())))
        .collect();

    let data: Vec<ReviewDto> = reviews
        .iter()
        .map(|r| ReviewDto::from_model(r, names.get(&r.user_id).cloned()))
        .collect();

    tracing::info!(results = data.len(), "get_book_reviews successful");
    Ok(Json(ReviewListResponseDto {
        status: "success".to_string(),
        results: data.len(),
        data,
    }))
}

/// The caller's own reviews, book titles joined in.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.user_name))]
pub async fn get_my_reviews(
    Extension(jwt): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = jwt.user.id.ok_or_else(|| {
        tracing::error!("Stored user has no id");
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let reviews = app_state
        .db_client
        .get_reviews_by_user(user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user reviews: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let book_ids: Vec<ObjectId> = reviews.iter().map(|r| r.book_id).collect();
    let books = app_state
        .db_client
        .get_books_by_ids(&book_ids)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting reviewed books: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    let titles: HashMap<ObjectId, String> = books
        .iter()
        .filter_map(|b| b.id.map(|id| (id, b.title.clone())))
        .collect();

    let data: Vec<UserReviewDto> = reviews
        .iter()
        .map(|r| UserReviewDto::from_model(r, titles.get(&r.book_id).cloned()))
        .collect();

    tracing::info!(results = data.len(), "get_my_reviews successful");
    Ok(Json(UserReviewListResponseDto {
        status: "success".to_string(),
        results: data.len(),
        data,
    }))
}

/// One review per user per book; the book's average rating is recomputed
/// after the insert.
#[instrument(skip(app_state, jwt, body), fields(username = %jwt.user.user_name))]
pub async fn create_review(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<ReviewCreateDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_review input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let book_id = ObjectId::parse_str(&body.book_id)
        .map_err(|_| HttpError::bad_request("Invalid book ID".to_string()))?;
    let user_id = jwt.user.id.ok_or_else(|| {
        tracing::error!("Stored user has no id");
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    app_state
        .db_client
        .get_book(book_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting book: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Book not found".to_string()))?;

    let existing = app_state
        .db_client
        .get_review_by_user_and_book(user_id, book_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, checking for existing review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    if existing.is_some() {
        return Err(HttpError::bad_request(
            "You have already reviewed this book".to_string(),
        ));
    }

    let review = app_state
        .db_client
        .save_review(book_id, user_id, body.title, body.rating, body.content)
        .await
        .map_err(|e| {
            tracing::error!("DB error, saving review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    let review_id = review.id.ok_or_else(|| {
        tracing::error!("Saved review has no id");
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    app_state
        .db_client
        .push_book_review(book_id, review_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, linking review to book: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    app_state
        .db_client
        .push_user_review(user_id, review_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, linking review to user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    app_state
        .db_client
        .recalculate_book_rating(book_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, recalculating book rating: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!("create_review successful");
    Ok((
        StatusCode::CREATED,
        Json(SingleReviewResponseDto {
            status: "success".to_string(),
            data: ReviewDto::from_model(&review, Some(jwt.user.user_name)),
        }),
    ))
}

/// Owner-filtered update; a review belonging to someone else looks the same
/// as a missing one.
#[instrument(skip(app_state, jwt, body), fields(username = %jwt.user.user_name))]
pub async fn update_review(
    Path(review_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    Json(body): Json<ReviewUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    let review_id = ObjectId::parse_str(&review_id)
        .map_err(|_| HttpError::bad_request("Invalid review ID".to_string()))?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid update_review input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let user_id = jwt.user.id.ok_or_else(|| {
        tracing::error!("Stored user has no id");
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let review = app_state
        .db_client
        .update_review(review_id, user_id, body.title, body.rating, body.content)
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| {
            HttpError::not_found("Review not found or unauthorized to edit".to_string())
        })?;

    app_state
        .db_client
        .recalculate_book_rating(review.book_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, recalculating book rating: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!("update_review successful");
    Ok(Json(SingleReviewResponseDto {
        status: "success".to_string(),
        data: ReviewDto::from_model(&review, Some(jwt.user.user_name)),
    }))
}

/// Owner-filtered delete. The review's id is pulled from both the book's
/// and the owner's back-reference lists and the average is recomputed.
/// Comments under the review are left in place.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.user_name))]
pub async fn delete_review(
    Path(review_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let review_id = ObjectId::parse_str(&review_id)
        .map_err(|_| HttpError::bad_request("Invalid review ID".to_string()))?;

    let user_id = jwt.user.id.ok_or_else(|| {
        tracing::error!("Stored user has no id");
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let review = app_state
        .db_client
        .delete_review(review_id, user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, deleting review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| {
            HttpError::not_found("Review not found or unauthorized to delete".to_string())
        })?;

    app_state
        .db_client
        .pull_book_review(review.book_id, review_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, unlinking review from book: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    app_state
        .db_client
        .pull_user_review(user_id, review_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, unlinking review from user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    app_state
        .db_client
        .recalculate_book_rating(review.book_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, recalculating book rating: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!("delete_review successful");
    Ok(StatusCode::NO_CONTENT)
}
