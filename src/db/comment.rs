use super::DBClient;
use crate::models::Comment;
use futures::TryStreamExt;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use mongodb::options::ReturnDocument;

pub trait CommentExt {
    async fn get_comment(
        &self,
        comment_id: ObjectId,
    ) -> Result<Option<Comment>, mongodb::error::Error>;

    async fn get_comments_by_review(
        &self,
        review_id: ObjectId,
    ) -> Result<Vec<Comment>, mongodb::error::Error>;

    async fn get_comments_by_user(
        &self,
        user_id: ObjectId,
    ) -> Result<Vec<Comment>, mongodb::error::Error>;

    /// Comments under several reviews at once (book-deletion cascade).
    async fn get_comments_by_reviews(
        &self,
        review_ids: &[ObjectId],
    ) -> Result<Vec<Comment>, mongodb::error::Error>;

    /// Resolve a back-reference list into documents. Order is unspecified.
    async fn get_comments_by_ids(
        &self,
        ids: &[ObjectId],
    ) -> Result<Vec<Comment>, mongodb::error::Error>;

    /// Insert only; back-reference pushes are follow-up writes.
    async fn save_comment(
        &self,
        review_id: ObjectId,
        user_id: ObjectId,
        content: String,
    ) -> Result<Comment, mongodb::error::Error>;

    /// Owner-filtered; `None` when the comment is missing or not owned by
    /// `user_id`.
    async fn update_comment(
        &self,
        comment_id: ObjectId,
        user_id: ObjectId,
        content: String,
    ) -> Result<Option<Comment>, mongodb::error::Error>;

    /// Owner-filtered delete; returns the removed document for the
    /// back-reference pulls.
    async fn delete_comment(
        &self,
        comment_id: ObjectId,
        user_id: ObjectId,
    ) -> Result<Option<Comment>, mongodb::error::Error>;

    async fn delete_comments_by_user(
        &self,
        user_id: ObjectId,
    ) -> Result<(), mongodb::error::Error>;

    async fn delete_comments_by_reviews(
        &self,
        review_ids: &[ObjectId],
    ) -> Result<(), mongodb::error::Error>;
}

impl CommentExt for DBClient {
    async fn get_comment(
        &self,
        comment_id: ObjectId,
    ) -> Result<Option<Comment>, mongodb::error::Error> {
        self.comments().find_one(doc! { "_id": comment_id }).await
    }

    async fn get_comments_by_review(
        &self,
        review_id: ObjectId,
    ) -> Result<Vec<Comment>, mongodb::error::Error> {
        let cursor = self
            .comments()
            .find(doc! { "reviewId": review_id })
            .sort(doc! { "createdAt": -1 })
            .await?;
        cursor.try_collect().await
    }

    async fn get_comments_by_user(
        &self,
        user_id: ObjectId,
    ) -> Result<Vec<Comment>, mongodb::error::Error> {
        let cursor = self
            .comments()
            .find(doc! { "userId": user_id })
            .sort(doc! { "createdAt": -1 })
            .await?;
        cursor.try_collect().await
    }

    async fn get_comments_by_reviews(
        &self,
        review_ids: &[ObjectId],
    ) -> Result<Vec<Comment>, mongodb::error::Error> {
        if review_ids.is_empty() {
            return Ok(vec![]);
        }
        let cursor = self
            .comments()
            .find(doc! { "reviewId": { "$in": review_ids.to_vec() } })
            .await?;
        cursor.try_collect().await
    }

    async fn get_comments_by_ids(
        &self,
        ids: &[ObjectId],
    ) -> Result<Vec<Comment>, mongodb::error::Error> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let cursor = self
            .comments()
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .await?;
        cursor.try_collect().await
    }

    async fn save_comment(
        &self,
        review_id: ObjectId,
        user_id: ObjectId,
        content: String,
    ) -> Result<Comment, mongodb::error::Error> {
        let now = DateTime::now();
        let mut comment = Comment {
            id: None,
            review_id,
            user_id,
            content,
            created_at: now,
            updated_at: now,
        };

        let result = self.comments().insert_one(&comment).await?;
        comment.id = result.inserted_id.as_object_id();
        Ok(comment)
    }

    async fn update_comment(
        &self,
        comment_id: ObjectId,
        user_id: ObjectId,
        content: String,
    ) -> Result<Option<Comment>, mongodb::error::Error> {
        self.comments()
            .find_one_and_update(
                doc! { "_id": comment_id, "userId": user_id },
                doc! { "$set": { "content": content, "updatedAt": DateTime::now() } },
            )
            .return_document(ReturnDocument::After)
            .await
    }

    async fn delete_comment(
        &self,
        comment_id: ObjectId,
        user_id: ObjectId,
    ) -> Result<Option<Comment>, mongodb::error::Error> {
        self.comments()
            .find_one_and_delete(doc! { "_id": comment_id, "userId": user_id })
            .await
    }

    async fn delete_comments_by_user(
        &self,
        user_id: ObjectId,
    ) -> Result<(), mongodb::error::Error> {
        self.comments().delete_many(doc! { "userId": user_id }).await?;
        Ok(())
    }

    async fn delete_comments_by_reviews(
        &self,
        review_ids: &[ObjectId],
    ) -> Result<(), mongodb::error::Error> {
        if review_ids.is_empty() {
            return Ok(());
        }
        self.comments()
            .delete_many(doc! { "reviewId": { "$in": review_ids.to_vec() } })
            .await?;
        Ok(())
    }
}
