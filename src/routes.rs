use axum::Router;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    AppState,
    handler::{
        auth::auth_handler, book::book_handler, comment::comment_handler,
        review::review_handler, users::users_handler,
    },
};

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .nest("/auth", auth_handler())
        .nest("/books", book_handler(app_state.clone()))
        .nest("/reviews", review_handler(app_state.clone()))
        .nest("/comments", comment_handler(app_state.clone()))
        .nest("/user", users_handler(app_state.clone()))
        // Uploaded avatars are served straight from disk.
        .nest_service("/uploads", ServeDir::new("public/uploads"))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
