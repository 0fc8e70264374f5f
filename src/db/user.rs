use super::DBClient;
use crate::models::{User, UserRole};
use futures::TryStreamExt;
use mongodb::bson::{Bson, DateTime, doc, oid::ObjectId};
use mongodb::options::ReturnDocument;

/// User document operations.
pub trait UserExt {
    /// Get a single user by id, email, or verification token; the first
    /// `Some` argument wins. Token lookup serves both the email-verification
    /// and the password-reset flow.
    async fn get_user(
        &self,
        user_id: Option<ObjectId>,
        email: Option<&str>,
        token: Option<&str>,
    ) -> Result<Option<User>, mongodb::error::Error>;

    /// Fetch the users behind a set of ids, e.g. to join author names onto
    /// a page of reviews. Order is unspecified.
    async fn get_users_by_ids(&self, ids: &[ObjectId])
    -> Result<Vec<User>, mongodb::error::Error>;

    /// Insert a new, unverified user. Bounces with a duplicate-key error
    /// when the email is already taken.
    async fn save_user<T: Into<String> + Send>(
        &self,
        user_name: T,
        email: T,
        password: T,
        role: UserRole,
        verification_token: T,
        token_expires_at: DateTime,
    ) -> Result<User, mongodb::error::Error>;

    async fn delete_user(&self, user_id: ObjectId) -> Result<(), mongodb::error::Error>;

    /// Update bio and/or avatar path; absent arguments leave the stored
    /// value untouched. Returns the updated document.
    async fn update_profile(
        &self,
        user_id: ObjectId,
        bio: Option<String>,
        profile_picture: Option<String>,
    ) -> Result<Option<User>, mongodb::error::Error>;

    async fn update_user_password(
        &self,
        user_id: ObjectId,
        new_password: String,
    ) -> Result<Option<User>, mongodb::error::Error>;

    /// Store a fresh verification/reset token with its expiry.
    async fn set_verification_token(
        &self,
        user_id: ObjectId,
        token: &str,
        token_expires_at: DateTime,
    ) -> Result<(), mongodb::error::Error>;

    /// Flip the account to verified and clear the token, making it
    /// single-use.
    async fn redeem_verification_token(&self, token: &str)
    -> Result<(), mongodb::error::Error>;

    /// Clear the token without touching the verified flag (password reset).
    async fn clear_verification_token(
        &self,
        user_id: ObjectId,
    ) -> Result<(), mongodb::error::Error>;

    async fn push_user_review(
        &self,
        user_id: ObjectId,
        review_id: ObjectId,
    ) -> Result<(), mongodb::error::Error>;

    async fn pull_user_review(
        &self,
        user_id: ObjectId,
        review_id: ObjectId,
    ) -> Result<(), mongodb::error::Error>;

    async fn push_user_comment(
        &self,
        user_id: ObjectId,
        comment_id: ObjectId,
    ) -> Result<(), mongodb::error::Error>;

    async fn pull_user_comment(
        &self,
        user_id: ObjectId,
        comment_id: ObjectId,
    ) -> Result<(), mongodb::error::Error>;
}

impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<ObjectId>,
        email: Option<&str>,
        token: Option<&str>,
    ) -> Result<Option<User>, mongodb::error::Error> {
        let filter = if let Some(user_id) = user_id {
            doc! { "_id": user_id }
        } else if let Some(email) = email {
            doc! { "email": email }
        } else if let Some(token) = token {
            doc! { "verificationToken": token }
        } else {
            return Ok(None);
        };

        self.users().find_one(filter).await
    }

    async fn get_users_by_ids(
        &self,
        ids: &[ObjectId],
    ) -> Result<Vec<User>, mongodb::error::Error> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let cursor = self
            .users()
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .await?;
        cursor.try_collect().await
    }

    async fn save_user<T: Into<String> + Send>(
        &self,
        user_name: T,
        email: T,
        password: T,
        role: UserRole,
        verification_token: T,
        token_expires_at: DateTime,
    ) -> Result<User, mongodb::error::Error> {
        let now = DateTime::now();
        let mut user = User {
            id: None,
            user_name: user_name.into(),
            email: email.into(),
            password: password.into(),
            role,
            verified: false,
            verification_token: Some(verification_token.into()),
            token_expires_at: Some(token_expires_at),
            bio: None,
            profile_picture: None,
            reviews: vec![],
            comments: vec![],
            created_at: now,
            updated_at: now,
        };

        let result = self.users().insert_one(&user).await?;
        user.id = result.inserted_id.as_object_id();
        Ok(user)
    }

    async fn delete_user(&self, user_id: ObjectId) -> Result<(), mongodb::error::Error> {
        self.users().delete_one(doc! { "_id": user_id }).await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: ObjectId,
        bio: Option<String>,
        profile_picture: Option<String>,
    ) -> Result<Option<User>, mongodb::error::Error> {
        let mut set = doc! { "updatedAt": DateTime::now() };
        if let Some(bio) = bio {
            set.insert("bio", bio);
        }
        if let Some(picture) = profile_picture {
            set.insert("profilePicture", picture);
        }

        self.users()
            .find_one_and_update(doc! { "_id": user_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
    }

    async fn update_user_password(
        &self,
        user_id: ObjectId,
        new_password: String,
    ) -> Result<Option<User>, mongodb::error::Error> {
        self.users()
            .find_one_and_update(
                doc! { "_id": user_id },
                doc! { "$set": { "password": new_password, "updatedAt": DateTime::now() } },
            )
            .return_document(ReturnDocument::After)
            .await
    }

    async fn set_verification_token(
        &self,
        user_id: ObjectId,
        token: &str,
        token_expires_at: DateTime,
    ) -> Result<(), mongodb::error::Error> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": {
                    "verificationToken": token,
                    "tokenExpiresAt": token_expires_at,
                    "updatedAt": DateTime::now(),
                } },
            )
            .await?;
        Ok(())
    }

    async fn redeem_verification_token(&self, token: &str) -> Result<(), mongodb::error::Error> {
        self.users()
            .update_one(
                doc! { "verificationToken": token },
                doc! { "$set": {
                    "verified": true,
                    "verificationToken": Bson::Null,
                    "tokenExpiresAt": Bson::Null,
                    "updatedAt": DateTime::now(),
                } },
            )
            .await?;
        Ok(())
    }

    async fn clear_verification_token(
        &self,
        user_id: ObjectId,
    ) -> Result<(), mongodb::error::Error> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": {
                    "verificationToken": Bson::Null,
                    "tokenExpiresAt": Bson::Null,
                    "updatedAt": DateTime::now(),
                } },
            )
            .await?;
        Ok(())
    }

    async fn push_user_review(
        &self,
        user_id: ObjectId,
        review_id: ObjectId,
    ) -> Result<(), mongodb::error::Error> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! {
                    "$push": { "reviews": review_id },
                    "$set": { "updatedAt": DateTime::now() },
                },
            )
            .await?;
        Ok(())
    }

    async fn pull_user_review(
        &self,
        user_id: ObjectId,
        review_id: ObjectId,
    ) -> Result<(), mongodb::error::Error> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! {
                    "$pull": { "reviews": review_id },
                    "$set": { "updatedAt": DateTime::now() },
                },
            )
            .await?;
        Ok(())
    }

    async fn push_user_comment(
        &self,
        user_id: ObjectId,
        comment_id: ObjectId,
    ) -> Result<(), mongodb::error::Error> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! {
                    "$push": { "comments": comment_id },
                    "$set": { "updatedAt": DateTime::now() },
                },
            )
            .await?;
        Ok(())
    }

    async fn pull_user_comment(
        &self,
        user_id: ObjectId,
        comment_id: ObjectId,
    ) -> Result<(), mongodb::error::Error> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! {
                    "$pull": { "comments": comment_id },
                    "$set": { "updatedAt": DateTime::now() },
                },
            )
            .await?;
        Ok(())
    }
}
