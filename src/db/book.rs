use super::DBClient;
use crate::models::Book;
use futures::TryStreamExt;
use mongodb::bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use mongodb::options::ReturnDocument;

pub trait BookExt {
    async fn get_book(&self, book_id: ObjectId) -> Result<Option<Book>, mongodb::error::Error>;

    /// One catalog page, newest first. Filters are combined with AND.
    async fn get_books(
        &self,
        page: i32,
        limit: i32,
        genre: Option<&str>,
        author: Option<&str>,
        title: Option<&str>,
    ) -> Result<Vec<Book>, mongodb::error::Error>;

    /// Total matching the same filters, for pagination metadata.
    async fn get_book_count(
        &self,
        genre: Option<&str>,
        author: Option<&str>,
        title: Option<&str>,
    ) -> Result<u64, mongodb::error::Error>;

    async fn get_books_by_ids(&self, ids: &[ObjectId])
    -> Result<Vec<Book>, mongodb::error::Error>;

    /// Books carrying `genre`, excluding `exclude` ids, newest first. Used by
    /// the recommendation backfill loop.
    async fn get_books_in_genre(
        &self,
        genre: &str,
        exclude: &[ObjectId],
        limit: i64,
    ) -> Result<Vec<Book>, mongodb::error::Error>;

    async fn save_book(
        &self,
        title: String,
        author: String,
        description: String,
        genre: Vec<String>,
        publication_date: DateTime,
        page_count: i32,
        cover: String,
    ) -> Result<Book, mongodb::error::Error>;

    /// Partial update; `None` fields stay as stored. Returns the updated
    /// document, or `None` when the book does not exist.
    async fn update_book(
        &self,
        book_id: ObjectId,
        title: Option<String>,
        author: Option<String>,
        description: Option<String>,
        genre: Option<Vec<String>>,
        publication_date: Option<DateTime>,
        page_count: Option<i32>,
        cover: Option<String>,
    ) -> Result<Option<Book>, mongodb::error::Error>;

    async fn delete_book(&self, book_id: ObjectId)
    -> Result<Option<Book>, mongodb::error::Error>;

    async fn push_book_review(
        &self,
        book_id: ObjectId,
        review_id: ObjectId,
    ) -> Result<(), mongodb::error::Error>;

    async fn pull_book_review(
        &self,
        book_id: ObjectId,
        review_id: ObjectId,
    ) -> Result<(), mongodb::error::Error>;

    /// Overwrite the stored aggregate; `None` removes the field entirely so
    /// an unreviewed book looks the same as a freshly created one.
    async fn set_average_rating(
        &self,
        book_id: ObjectId,
        average: Option<f64>,
    ) -> Result<(), mongodb::error::Error>;
}

/// Genre matches array membership exactly; author/title are anchored
/// nowhere, case-insensitive.
fn catalog_filter(genre: Option<&str>, author: Option<&str>, title: Option<&str>) -> Document {
    let mut filter = Document::new();
    if let Some(genre) = genre {
        filter.insert("genre", genre);
    }
    if let Some(author) = author {
        filter.insert("author", doc! { "$regex": author, "$options": "i" });
    }
    if let Some(title) = title {
        filter.insert("title", doc! { "$regex": title, "$options": "i" });
    }
    filter
}

impl BookExt for DBClient {
    async fn get_book(&self, book_id: ObjectId) -> Result<Option<Book>, mongodb::error::Error> {
        self.books().find_one(doc! { "_id": book_id }).await
    }

    async fn get_books(
        &self,
        page: i32,
        limit: i32,
        genre: Option<&str>,
        author: Option<&str>,
        title: Option<&str>,
    ) -> Result<Vec<Book>, mongodb::error::Error> {
        let offset = (page - 1) * limit;

        let cursor = self
            .books()
            .find(catalog_filter(genre, author, title))
            .sort(doc! { "createdAt": -1 })
            .skip(offset as u64)
            .limit(limit as i64)
            .await?;
        cursor.try_collect().await
    }

    async fn get_book_count(
        &self,
        genre: Option<&str>,
        author: Option<&str>,
        title: Option<&str>,
    ) -> Result<u64, mongodb::error::Error> {
        self.books()
            .count_documents(catalog_filter(genre, author, title))
            .await
    }

    async fn get_books_by_ids(
        &self,
        ids: &[ObjectId],
    ) -> Result<Vec<Book>, mongodb::error::Error> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let cursor = self
            .books()
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .await?;
        cursor.try_collect().await
    }

    async fn get_books_in_genre(
        &self,
        genre: &str,
        exclude: &[ObjectId],
        limit: i64,
    ) -> Result<Vec<Book>, mongodb::error::Error> {
        let cursor = self
            .books()
            .find(doc! {
                "genre": genre,
                "_id": { "$nin": exclude.to_vec() },
            })
            .sort(doc! { "createdAt": -1 })
            .limit(limit)
            .await?;
        cursor.try_collect().await
    }

    async fn save_book(
        &self,
        title: String,
        author: String,
        description: String,
        genre: Vec<String>,
        publication_date: DateTime,
        page_count: i32,
        cover: String,
    ) -> Result<Book, mongodb::error::Error> {
        let now = DateTime::now();
        let mut book = Book {
            id: None,
            title,
            author,
            description,
            genre,
            publication_date,
            page_count,
            cover,
            average_rating: None,
            reviews: vec![],
            created_at: now,
            updated_at: now,
        };

        let result = self.books().insert_one(&book).await?;
        book.id = result.inserted_id.as_object_id();
        Ok(book)
    }

    async fn update_book(
        &self,
        book_id: ObjectId,
        title: Option<String>,
        author: Option<String>,
        description: Option<String>,
        genre: Option<Vec<String>>,
        publication_date: Option<DateTime>,
        page_count: Option<i32>,
        cover: Option<String>,
    ) -> Result<Option<Book>, mongodb::error::Error> {
        let mut set = doc! { "updatedAt": DateTime::now() };
        if let Some(title) = title {
            set.insert("title", title);
        }
        if let Some(author) = author {
            set.insert("author", author);
        }
        if let Some(description) = description {
            set.insert("description", description);
        }
        if let Some(genre) = genre {
            set.insert("genre", genre);
        }
        if let Some(publication_date) = publication_date {
            set.insert("publicationDate", publication_date);
        }
        if let Some(page_count) = page_count {
            set.insert("pageCount", page_count);
        }
        if let Some(cover) = cover {
            set.insert("cover", cover);
        }

        self.books()
            .find_one_and_update(doc! { "_id": book_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
    }

    async fn delete_book(
        &self,
        book_id: ObjectId,
    ) -> Result<Option<Book>, mongodb::error::Error> {
        self.books().find_one_and_delete(doc! { "_id": book_id }).await
    }

    async fn push_book_review(
        &self,
        book_id: ObjectId,
        review_id: ObjectId,
    ) -> Result<(), mongodb::error::Error> {
        self.books()
            .update_one(
                doc! { "_id": book_id },
                doc! {
                    "$push": { "reviews": review_id },
                    "$set": { "updatedAt": DateTime::now() },
                },
            )
            .await?;
        Ok(())
    }

    async fn pull_book_review(
        &self,
        book_id: ObjectId,
        review_id: ObjectId,
    ) -> Result<(), mongodb::error::Error> {
        self.books()
            .update_one(
                doc! { "_id": book_id },
                doc! {
                    "$pull": { "reviews": review_id },
                    "$set": { "updatedAt": DateTime::now() },
                },
            )
            .await?;
        Ok(())
    }

    async fn set_average_rating(
        &self,
        book_id: ObjectId,
        average: Option<f64>,
    ) -> Result<(), mongodb::error::Error> {
        let update = match average {
            Some(value) => doc! {
                "$set": { "averageRating": value, "updatedAt": DateTime::now() },
            },
            None => doc! {
                "$unset": { "averageRating": Bson::from("") },
                "$set": { "updatedAt": DateTime::now() },
            },
        };
        self.books().update_one(doc! { "_id": book_id }, update).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        assert!(catalog_filter(None, None, None).is_empty());
    }

    #[test]
    fn genre_filter_is_exact_membership() {
        let filter = catalog_filter(Some("Fantasy"), None, None);
        assert_eq!(filter.get_str("genre").unwrap(), "Fantasy");
    }

    #[test]
    fn author_and_title_filters_are_case_insensitive_regexes() {
        let filter = catalog_filter(None, Some("sapkowski"), Some("witcher"));
        let author = filter.get_document("author").unwrap();
        assert_eq!(author.get_str("$regex").unwrap(), "sapkowski");
        assert_eq!(author.get_str("$options").unwrap(), "i");
        let title = filter.get_document("title").unwrap();
        assert_eq!(title.get_str("$regex").unwrap(), "witcher");
    }

    #[test]
    fn filters_combine_with_and() {
        let filter = catalog_filter(Some("Fantasy"), Some("tolkien"), None);
        assert_eq!(filter.len(), 2);
    }
}
