use std::collections::HashMap;

use crate::{
    AppState,
    db::{BookExt, CommentExt, ReviewExt, UserExt},
    dtos::{
        BookCreateDto, BookDto, BookListResponseDto, BookResponseDto, BookUpdateDto,
        BooksQueryParams, PaginationDto, RecommendationsQueryDto, RecommendationsResponseDto,
    },
    error::{ErrorMessage, HttpError},
    middleware::{JWTAuthMiddleware, auth, role_check},
    models::{Book, UserRole},
};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use chrono::NaiveTime;
use mongodb::bson::{self, oid::ObjectId};
use tracing::instrument;
use validator::Validate;

const DEFAULT_PAGE: i32 = 1;
const DEFAULT_LIMIT: i32 = 10;
const DEFAULT_RECOMMENDATIONS: i64 = 5;

pub fn book_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_books))
        .route(
            "/",
            post(create_book)
                .route_layer(middleware::from_fn(|req, next| {
                    role_check(req, next, vec![UserRole::Admin])
                }))
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/recommendations",
            get(get_recommendations)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/{book_id}", get(get_book))
        .route(
            "/{book_id}",
            put(update_book)
                .route_layer(middleware::from_fn(|req, next| {
                    role_check(req, next, vec![UserRole::Admin])
                }))
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/{book_id}",
            delete(delete_book)
                .route_layer(middleware::from_fn(|req, next| {
                    role_check(req, next, vec![UserRole::Admin])
                }))
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

fn to_bson_date(date: chrono::NaiveDate) -> bson::DateTime {
    bson::DateTime::from_millis(date.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
}

pub async fn get_books(
    Query(query_params): Query<BooksQueryParams>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query_params.page.unwrap_or(DEFAULT_PAGE);
    let limit = query_params.limit.unwrap_or(DEFAULT_LIMIT);

    let books = app_state
        .db_client
        .get_books(
            page,
            limit,
            query_params.genre.as_deref(),
            query_params.author.as_deref(),
            query_params.title.as_deref(),
        )
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let total = app_state
        .db_client
        .get_book_count(
            query_params.genre.as_deref(),
            query_params.author.as_deref(),
            query_params.title.as_deref(),
        )
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let total_pages = (total as f64 / limit as f64).ceil() as i32;

    Ok(Json(BookListResponseDto {
        status: "success".to_string(),
        data: BookDto::from_models(&books),
        pagination: PaginationDto {
            page,
            limit,
            total: total as i32,
            total_pages,
        },
    }))
}

pub async fn get_book(
    Path(book_id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let book_id = ObjectId::parse_str(&book_id)
        .map_err(|_| HttpError::bad_request("Invalid book ID".to_string()))?;

    let book = app_state
        .db_client
        .get_book(book_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found("Book not found".to_string()))?;

    Ok(Json(BookResponseDto {
        status: "success".to_string(),
        data: BookDto::from_model(&book),
    }))
}

pub async fn create_book(
    State(app_state): State<AppState>,
    Json(body): Json<BookCreateDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let book = app_state
        .db_client
        .save_book(
            body.title,
            body.author,
            body.description,
            body.genre,
            to_bson_date(body.publication_date),
            body.page_count,
            body.cover,
        )
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(BookResponseDto {
            status: "success".to_string(),
            data: BookDto::from_model(&book),
        }),
    ))
}

pub async fn update_book(
    Path(book_id): Path<String>,
    State(app_state): State<AppState>,
    Json(body): Json<BookUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    let book_id = ObjectId::parse_str(&book_id)
        .map_err(|_| HttpError::bad_request("Invalid book ID".to_string()))?;

    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let book = app_state
        .db_client
        .update_book(
            book_id,
            body.title,
            body.author,
            body.description,
            body.genre,
            body.publication_date.map(to_bson_date),
            body.page_count,
            body.cover,
        )
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found("Book not found".to_string()))?;

    Ok(Json(BookResponseDto {
        status: "success".to_string(),
        data: BookDto::from_model(&book),
    }))
}

pub async fn delete_book(
    Path(book_id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let book_id = ObjectId::parse_str(&book_id)
        .map_err(|_| HttpError::bad_request("Invalid book ID".to_string()))?;

    app_state
        .db_client
        .delete_book(book_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found("Book not found".to_string()))?;

    // The book's reviews and their comments go with it; each deleted
    // document is also pulled from its owner's back-reference list.
    let reviews = app_state
        .db_client
        .get_reviews_by_book(book_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;
    let review_ids: Vec<ObjectId> = reviews.iter().filter_map(|r| r.id).collect();

    let comments = app_state
        .db_client
        .get_comments_by_reviews(&review_ids)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    for comment in &comments {
        if let Some(comment_id) = comment.id {
            app_state
                .db_client
                .pull_user_comment(comment.user_id, comment_id)
                .await
                .map_err(|e| HttpError::server_error(e.to_string()))?;
        }
    }

    app_state
        .db_client
        .delete_comments_by_reviews(&review_ids)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    for review in &reviews {
        if let Some(review_id) = review.id {
            app_state
                .db_client
                .pull_user_review(review.user_id, review_id)
                .await
                .map_err(|e| HttpError::server_error(e.to_string()))?;
        }
    }

    app_state
        .db_client
        .delete_reviews_by_book(book_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(StatusCode::NO_CONTENT)
}

/// Genres of highly rated books, most frequent first, ties by name.
fn rank_genres(genre_lists: &[Vec<String>]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for list in genre_lists {
        for genre in list {
            *counts.entry(genre.as_str()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .map(|(genre, _)| genre.to_string())
        .collect()
}

/// Books the caller has not reviewed yet, drawn from the genres of books
/// they rated 4 or higher. Genres are tried in frequency order until the
/// requested count is filled; a caller without qualifying reviews gets an
/// empty list.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.user_name))]
pub async fn get_recommendations(
    Query(query_params): Query<RecommendationsQueryDto>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let limit = query_params.limit.unwrap_or(DEFAULT_RECOMMENDATIONS);
    let user_id = jwt.user.id.ok_or_else(|| {
        tracing::error!("Stored user has no id");
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let reviews = app_state
        .db_client
        .get_reviews_by_user(user_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let liked_ids: Vec<ObjectId> = reviews
        .iter()
        .filter(|r| r.rating >= 4)
        .map(|r| r.book_id)
        .collect();

    let liked_books = app_state
        .db_client
        .get_books_by_ids(&liked_ids)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let genre_lists: Vec<Vec<String>> = liked_books.iter().map(|b| b.genre.clone()).collect();
    let ranked = rank_genres(&genre_lists);

    // All reviewed books are excluded, not just the liked ones, and each
    // returned book joins the exclusion list so genres never overlap.
    let mut excluded: Vec<ObjectId> = reviews.iter().map(|r| r.book_id).collect();
    let mut recommended: Vec<Book> = Vec::new();

    for genre in &ranked {
        let remaining = limit - recommended.len() as i64;
        if remaining <= 0 {
            break;
        }

        let books = app_state
            .db_client
            .get_books_in_genre(genre, &excluded, remaining)
            .await
            .map_err(|e| HttpError::server_error(e.to_string()))?;

        for book in books {
            if let Some(id) = book.id {
                excluded.push(id);
            }
            recommended.push(book);
        }
    }

    tracing::info!(count = recommended.len(), "get_recommendations successful");
    Ok(Json(RecommendationsResponseDto {
        status: "success".to_string(),
        results: recommended.len(),
        data: BookDto::from_models(&recommended),
    }))
}

#[cfg(test)]
mod tests {
    use super::rank_genres;

    fn lists(input: &[&[&str]]) -> Vec<Vec<String>> {
        input
            .iter()
            .map(|list| list.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn ranks_genres_by_frequency() {
        let genre_lists = lists(&[
            &["Fantasy", "Adventure"],
            &["Fantasy"],
            &["Horror", "Fantasy"],
            &["Adventure"],
        ]);

        assert_eq!(
            rank_genres(&genre_lists),
            vec!["Fantasy", "Adventure", "Horror"]
        );
    }

    #[test]
    fn breaks_frequency_ties_by_name() {
        let genre_lists = lists(&[&["Scifi", "Drama"], &["Drama", "Scifi"]]);

        assert_eq!(rank_genres(&genre_lists), vec!["Drama", "Scifi"]);
    }

    #[test]
    fn ranks_nothing_without_input() {
        assert_eq!(rank_genres(&[]), Vec::<String>::new());
    }
}
