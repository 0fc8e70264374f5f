use super::{BookExt, DBClient};
use crate::models::Review;
use futures::TryStreamExt;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use mongodb::options::ReturnDocument;

pub trait ReviewExt {
    async fn get_review(
        &self,
        review_id: ObjectId,
    ) -> Result<Option<Review>, mongodb::error::Error>;

    async fn get_reviews_by_book(
        &self,
        book_id: ObjectId,
    ) -> Result<Vec<Review>, mongodb::error::Error>;

    async fn get_reviews_by_user(
        &self,
        user_id: ObjectId,
    ) -> Result<Vec<Review>, mongodb::error::Error>;

    /// The one-review-per-(user, book) pre-check. Not backed by an index,
    /// so two racing creations can still both pass it.
    async fn get_review_by_user_and_book(
        &self,
        user_id: ObjectId,
        book_id: ObjectId,
    ) -> Result<Option<Review>, mongodb::error::Error>;

    async fn get_reviews_by_ids(
        &self,
        ids: &[ObjectId],
    ) -> Result<Vec<Review>, mongodb::error::Error>;

    /// Insert only; the back-reference pushes and the rating recompute are
    /// separate follow-up writes driven by the handler.
    async fn save_review(
        &self,
        book_id: ObjectId,
        user_id: ObjectId,
        title: Option<String>,
        rating: i32,
        content: String,
    ) -> Result<Review, mongodb::error::Error>;

    /// Owner-filtered update: matches only when `review_id` belongs to
    /// `user_id`, so a stranger's id gives `None`, not a permission error.
    async fn update_review(
        &self,
        review_id: ObjectId,
        user_id: ObjectId,
        title: Option<String>,
        rating: Option<i32>,
        content: Option<String>,
    ) -> Result<Option<Review>, mongodb::error::Error>;

    /// Owner-filtered delete; returns the removed document for the
    /// back-reference pulls.
    async fn delete_review(
        &self,
        review_id: ObjectId,
        user_id: ObjectId,
    ) -> Result<Option<Review>, mongodb::error::Error>;

    async fn delete_reviews_by_user(
        &self,
        user_id: ObjectId,
    ) -> Result<(), mongodb::error::Error>;

    async fn delete_reviews_by_book(
        &self,
        book_id: ObjectId,
    ) -> Result<(), mongodb::error::Error>;

    async fn push_review_comment(
        &self,
        review_id: ObjectId,
        comment_id: ObjectId,
    ) -> Result<(), mongodb::error::Error>;

    async fn pull_review_comment(
        &self,
        review_id: ObjectId,
        comment_id: ObjectId,
    ) -> Result<(), mongodb::error::Error>;

    /// Refetches every review of the book and overwrites the stored
    /// average. Deliberately O(reviews-per-book) with no incremental
    /// accumulator; last write wins under concurrency.
    async fn recalculate_book_rating(
        &self,
        book_id: ObjectId,
    ) -> Result<(), mongodb::error::Error>;
}

pub(crate) fn average_rating(reviews: &[Review]) -> Option<f64> {
    if reviews.is_empty() {
        return None;
    }
    let sum: f64 = reviews.iter().map(|r| r.rating as f64).sum();
    Some(sum / reviews.len() as f64)
}

impl ReviewExt for DBClient {
    async fn get_review(
        &self,
        review_id: ObjectId,
    ) -> Result<Option<Review>, mongodb::error::Error> {
        self.reviews().find_one(doc! { "_id": review_id }).await
    }

    async fn get_reviews_by_book(
        &self,
        book_id: ObjectId,
    ) -> Result<Vec<Review>, mongodb::error::Error> {
        let cursor = self
            .reviews()
            .find(doc! { "bookId": book_id })
            .sort(doc! { "createdAt": -1 })
            .await?;
        cursor.try_collect().await
    }

    async fn get_reviews_by_user(
        &self,
        user_id: ObjectId,
    ) -> Result<Vec<Review>, mongodb::error::Error> {
        let cursor = self
            .reviews()
            .find(doc! { "userId": user_id })
            .sort(doc! { "createdAt": -1 })
            .await?;
        cursor.try_collect().await
    }

    async fn get_review_by_user_and_book(
        &self,
        user_id: ObjectId,
        book_id: ObjectId,
    ) -> Result<Option<Review>, mongodb::error::Error> {
        self.reviews()
            .find_one(doc! { "userId": user_id, "bookId": book_id })
            .await
    }

    async fn get_reviews_by_ids(
        &self,
        ids: &[ObjectId],
    ) -> Result<Vec<Review>, mongodb::error::Error> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let cursor = self
            .reviews()
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .await?;
        cursor.try_collect().await
    }

    async fn save_review(
        &self,
        book_id: ObjectId,
        user_id: ObjectId,
        title: Option<String>,
        rating: i32,
        content: String,
    ) -> Result<Review, mongodb::error::Error> {
        let now = DateTime::now();
        let mut review = Review {
            id: None,
            book_id,
            user_id,
            title,
            rating,
            content,
            comments: vec![],
            created_at: now,
            updated_at: now,
        };

        let result = self.reviews().insert_one(&review).await?;
        review.id = result.inserted_id.as_object_id();
        Ok(review)
    }

    async fn update_review(
        &self,
        review_id: ObjectId,
        user_id: ObjectId,
        title: Option<String>,
        rating: Option<i32>,
        content: Option<String>,
    ) -> Result<Option<Review>, mongodb::error::Error> {
        let mut set = doc! { "updatedAt": DateTime::now() };
        if let Some(title) = title {
            set.insert("title", title);
        }
        if let Some(rating) = rating {
            set.insert("rating", rating);
        }
        if let Some(content) = content {
            set.insert("content", content);
        }

        self.reviews()
            .find_one_and_update(
                doc! { "_id": review_id, "userId": user_id },
                doc! { "$set": set },
            )
            .return_document(ReturnDocument::After)
            .await
    }

    async fn delete_review(
        &self,
        review_id: ObjectId,
        user_id: ObjectId,
    ) -> Result<Option<Review>, mongodb::error::Error> {
        self.reviews()
            .find_one_and_delete(doc! { "_id": review_id, "userId": user_id })
            .await
    }

    async fn delete_reviews_by_user(
        &self,
        user_id: ObjectId,
    ) -> Result<(), mongodb::error::Error> {
        self.reviews().delete_many(doc! { "userId": user_id }).await?;
        Ok(())
    }

    async fn delete_reviews_by_book(
        &self,
        book_id: ObjectId,
    ) -> Result<(), mongodb::error::Error> {
        self.reviews().delete_many(doc! { "bookId": book_id }).await?;
        Ok(())
    }

    async fn push_review_comment(
        &self,
        review_id: ObjectId,
        comment_id: ObjectId,
    ) -> Result<(), mongodb::error::Error> {
        self.reviews()
            .update_one(
                doc! { "_id": review_id },
                doc! {
                    "$push": { "comments": comment_id },
                    "$set": { "updatedAt": DateTime::now() },
                },
            )
            .await?;
        Ok(())
    }

    async fn pull_review_comment(
        &self,
        review_id: ObjectId,
        comment_id: ObjectId,
    ) -> Result<(), mongodb::error::Error> {
        self.reviews()
            .update_one(
                doc! { "_id": review_id },
                doc! {
                    "$pull": { "comments": comment_id },
                    "$set": { "updatedAt": DateTime::now() },
                },
            )
            .await?;
        Ok(())
    }

    async fn recalculate_book_rating(
        &self,
        book_id: ObjectId,
    ) -> Result<(), mongodb::error::Error> {
        let reviews = self.get_reviews_by_book(book_id).await?;
        self.set_average_rating(book_id, average_rating(&reviews)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_with_rating(rating: i32) -> Review {
        let now = DateTime::now();
        Review {
            id: Some(ObjectId::new()),
            book_id: ObjectId::new(),
            user_id: ObjectId::new(),
            title: None,
            rating,
            content: "content long enough".to_string(),
            comments: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn average_of_no_reviews_is_none() {
        assert_eq!(average_rating(&[]), None);
    }

    #[test]
    fn average_is_the_plain_mean() {
        let reviews = vec![
            review_with_rating(5),
            review_with_rating(4),
            review_with_rating(2),
        ];
        let avg = average_rating(&reviews).unwrap();
        assert!((avg - 11.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn single_review_average_equals_its_rating() {
        let reviews = vec![review_with_rating(3)];
        assert_eq!(average_rating(&reviews), Some(3.0));
    }
}
