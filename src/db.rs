use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};

use crate::models::{Book, Comment, Review, User};

pub mod scheduler;

mod user;
pub use user::UserExt;

mod book;
pub use book::BookExt;

mod review;
pub use review::ReviewExt;

mod comment;
pub use comment::CommentExt;

/// Shared handle to the document store. One of these lives in the
/// application state; the per-resource operations hang off it as extension
/// traits ([`UserExt`], [`BookExt`], [`ReviewExt`], [`CommentExt`]).
#[derive(Debug, Clone)]
pub struct DBClient {
    database: Database,
}

impl DBClient {
    /// Connects, runs one round trip so a bad connection string fails at
    /// startup instead of on the first request, and creates the unique
    /// index on `users.email`.
    pub async fn new(uri: &str, database_name: &str) -> Result<Self, mongodb::error::Error> {
        let client = Client::with_uri_str(uri).await?;
        let database = client.database(database_name);
        database.list_collection_names().await?;

        let db_client = DBClient { database };
        db_client.ensure_indexes().await?;
        Ok(db_client)
    }

    pub(crate) fn users(&self) -> Collection<User> {
        self.database.collection("users")
    }

    pub(crate) fn books(&self) -> Collection<Book> {
        self.database.collection("books")
    }

    pub(crate) fn reviews(&self) -> Collection<Review> {
        self.database.collection("reviews")
    }

    pub(crate) fn comments(&self) -> Collection<Comment> {
        self.database.collection("comments")
    }

    /// Email is the only field backed by a storage-level constraint; review
    /// (user, book) uniqueness is deliberately a write-time pre-check only.
    async fn ensure_indexes(&self) -> Result<(), mongodb::error::Error> {
        let options = IndexOptions::builder().unique(true).build();
        let model = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(options)
            .build();
        self.users().create_index(model).await?;
        Ok(())
    }
}

/// True when a write bounced off a unique index (Mongo error code 11000).
pub fn is_duplicate_key_error(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        ErrorKind::Command(command_error) => command_error.code == 11000,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Needs a running MongoDB; run with
    //   MONGODB_URI=... MONGODB_DATABASE=... cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn connects_and_creates_indexes() {
        dotenv::dotenv().ok();
        let uri = std::env::var("MONGODB_URI").expect("MONGODB_URI must be set");
        let database = std::env::var("MONGODB_DATABASE").expect("MONGODB_DATABASE must be set");
        let client = DBClient::new(&uri, &database).await;
        assert!(client.is_ok());
    }
}
