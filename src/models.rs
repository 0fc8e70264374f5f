use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// User role for role-based access control.
///
/// Stored in documents as the lowercase string ("admin" / "user"), which is
/// also how clients send it at signup.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }
}

/// Document in the `users` collection.
///
/// Field names are camelCase on the wire and in storage. `reviews` and
/// `comments` are back-reference lists of owned document ids, maintained
/// manually on each related create/delete; there is no schema-level
/// constraint behind them. `email` is backed by a unique index created at
/// startup.
///
/// `password` always holds the argon2 hash, never plain text.
/// `verification_token` doubles as the password-reset token; it is cleared
/// on redemption so a token can only be used once.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub verified: bool,
    pub verification_token: Option<String>,
    pub token_expires_at: Option<DateTime>,
    pub bio: Option<String>,
    /// Public URL path of the uploaded avatar, e.g.
    /// `/uploads/profile-pictures/profilePicture-....jpg`.
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub reviews: Vec<ObjectId>,
    #[serde(default)]
    pub comments: Vec<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Document in the `books` collection.
///
/// `average_rating` is absent until the first review lands and is overwritten
/// from a full refetch of the book's reviews on every review write.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub author: String,
    pub description: String,
    pub genre: Vec<String>,
    pub publication_date: DateTime,
    pub page_count: i32,
    pub cover: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub reviews: Vec<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Document in the `reviews` collection.
///
/// At most one review may exist per (`user_id`, `book_id`) pair; that is
/// enforced by a pre-check before insert, not by an index, so two racing
/// creations can both land.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub book_id: ObjectId,
    pub user_id: ObjectId,
    pub title: Option<String>,
    pub rating: i32,
    pub content: String,
    #[serde(default)]
    pub comments: Vec<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Document in the `comments` collection. A reply to one review.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub review_id: ObjectId,
    pub user_id: ObjectId,
    pub content: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson;

    #[test]
    fn role_round_trips_as_lowercase_string() {
        assert_eq!(UserRole::Admin.to_str(), "admin");
        assert_eq!(UserRole::User.to_str(), "user");
        let json = serde_json::to_string(&UserRole::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
        let back: UserRole = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(back, UserRole::User);
    }

    #[test]
    fn user_document_uses_camel_case_field_names() {
        let user = User {
            id: None,
            user_name: "geralt".to_string(),
            email: "geralt@kaermorhen.example".to_string(),
            password: "hash".to_string(),
            role: UserRole::User,
            verified: false,
            verification_token: Some("tok".to_string()),
            token_expires_at: Some(DateTime::now()),
            bio: None,
            profile_picture: None,
            reviews: vec![],
            comments: vec![],
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        };
        let doc = bson::to_document(&user).unwrap();
        assert!(doc.contains_key("userName"));
        assert!(doc.contains_key("verificationToken"));
        assert!(doc.contains_key("tokenExpiresAt"));
        assert!(doc.contains_key("createdAt"));
        // unset _id must be absent so the server generates one
        assert!(!doc.contains_key("_id"));
    }

    #[test]
    fn unrated_book_serializes_without_average_rating() {
        let book = Book {
            id: None,
            title: "The Last Wish".to_string(),
            author: "Andrzej Sapkowski".to_string(),
            description: "Short stories introducing Geralt of Rivia.".to_string(),
            genre: vec!["Fantasy".to_string()],
            publication_date: DateTime::now(),
            page_count: 288,
            cover: "https://covers.example/last-wish.jpg".to_string(),
            average_rating: None,
            reviews: vec![],
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        };
        let doc = bson::to_document(&book).unwrap();
        assert!(!doc.contains_key("averageRating"));
        assert!(doc.contains_key("pageCount"));
        assert!(doc.contains_key("publicationDate"));
    }

    #[test]
    fn review_deserializes_with_missing_back_reference_array() {
        let doc = bson::doc! {
            "bookId": ObjectId::new(),
            "userId": ObjectId::new(),
            "title": bson::Bson::Null,
            "rating": 4,
            "content": "A strong start to the saga.",
            "createdAt": DateTime::now(),
            "updatedAt": DateTime::now(),
        };
        let review: Review = bson::from_document(doc).unwrap();
        assert!(review.comments.is_empty());
        assert_eq!(review.rating, 4);
        assert!(review.title.is_none());
    }
}
