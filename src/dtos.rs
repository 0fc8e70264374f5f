use crate::models::{Book, Comment, Review, User};
use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson;
use serde::{Deserialize, Serialize};
use validator::Validate;

// DTOs define the JSON exchanged with clients, separate from the stored
// documents so the wire format never leaks hashes, tokens or raw ObjectIds.

fn bson_to_utc(dt: bson::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(dt.timestamp_millis()).unwrap_or_default()
}

fn oid_hex(id: &Option<bson::oid::ObjectId>) -> String {
    id.map(|v| v.to_hex()).unwrap_or_default()
}

// ============================================================================
// Authentication DTOs
// ============================================================================

/// Signup request. The role is sent as a plain string so an unknown value
/// fails validation with a 400 instead of a deserialization error.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RegisterUserDto {
    #[validate(length(min = 1, message = "Name is required"))]
    #[serde(rename = "userName")]
    pub user_name: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(length(
        min = 6,
        max = 100,
        message = "Password must be between 6 and 100 characters"
    ))]
    pub password: String,

    #[validate(
        length(min = 1, message = "Confirm Password is required"),
        must_match(other = "password", message = "passwords do not match")
    )]
    #[serde(rename = "confirmPassword")]
    pub password_confirm: String,

    #[validate(custom(function = "validate_role"))]
    pub role: String,
}

fn validate_role(role: &String) -> Result<(), validator::ValidationError> {
    if role == "admin" || role == "user" {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("invalid_role");
        err.message = Some("Role must be either \"admin\" or \"user\"".into());
        Err(err)
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(length(
        min = 6,
        max = 100,
        message = "Password must be between 6 and 100 characters"
    ))]
    pub password: String,
}

/// Password re-entry for destructive operations (account deletion).
#[derive(Validate, Serialize, Deserialize)]
pub struct DoubleCheckDto {
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Serialize, Deserialize, Validate, Debug)]
pub struct VerifyEmailQueryDto {
    #[validate(length(min = 1, message = "Token is required."))]
    pub token: String,
}

#[derive(Deserialize, Serialize, Validate, Debug, Clone)]
pub struct ForgotPasswordRequestDto {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ResetPasswordRequestDto {
    #[validate(length(min = 1, message = "Token is required."))]
    pub token: String,

    #[validate(length(
        min = 6,
        max = 100,
        message = "new password must be between 6 and 100 characters"
    ))]
    #[serde(rename = "newPassword")]
    pub new_password: String,

    #[validate(
        length(min = 1, message = "new password confirm is required"),
        must_match(other = "new_password", message = "new passwords do not match")
    )]
    #[serde(rename = "newPasswordConfirm")]
    pub new_password_confirm: String,
}

#[derive(Debug, Validate, Default, Clone, Serialize, Deserialize)]
pub struct UserPasswordUpdateDto {
    #[validate(length(
        min = 6,
        max = 100,
        message = "new password must be between 6 and 100 characters"
    ))]
    #[serde(rename = "newPassword")]
    pub new_password: String,

    #[validate(
        length(min = 1, message = "new password confirm is required"),
        must_match(other = "new_password", message = "new passwords do not match")
    )]
    #[serde(rename = "newPasswordConfirm")]
    pub new_password_confirm: String,

    #[validate(length(min = 6, message = "Old password must be at least 6 characters"))]
    #[serde(rename = "oldPassword")]
    pub old_password: String,
}

// ============================================================================
// Pagination & query DTOs
// ============================================================================

/// Catalog listing parameters. `genre` matches array membership exactly;
/// `author` and `title` are case-insensitive substring filters.
#[derive(Serialize, Deserialize, Validate, Debug, Default)]
pub struct BooksQueryParams {
    #[validate(range(min = 1))]
    pub page: Option<i32>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<i32>,

    #[validate(length(min = 1))]
    pub genre: Option<String>,

    #[validate(length(min = 1))]
    pub author: Option<String>,

    #[validate(length(min = 1))]
    pub title: Option<String>,
}

#[derive(Serialize, Deserialize, Validate, Debug, Default)]
pub struct RecommendationsQueryDto {
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginationDto {
    pub page: i32,
    pub limit: i32,
    pub total: i32,
    #[serde(rename = "totalPages")]
    pub total_pages: i32,
}

/// Generic success response
#[derive(Serialize, Deserialize)]
pub struct Response {
    pub status: &'static str,
    pub message: String,
}

// ============================================================================
// User response DTOs
// ============================================================================

/// Client-safe user data: everything except the password hash and the
/// verification token.
#[derive(Debug, Serialize, Deserialize)]
pub struct FilterUserDto {
    pub id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    pub email: String,
    pub role: String,
    pub verified: bool,
    pub bio: Option<String>,
    #[serde(rename = "profilePicture")]
    pub profile_picture: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            id: oid_hex(&user.id),
            user_name: user.user_name.to_owned(),
            email: user.email.to_owned(),
            role: user.role.to_str().to_string(),
            verified: user.verified,
            bio: user.bio.to_owned(),
            profile_picture: user.profile_picture.to_owned(),
            created_at: bson_to_utc(user.created_at),
            updated_at: bson_to_utc(user.updated_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserData {
    pub user: FilterUserDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponseDto {
    pub status: String,
    pub data: UserData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserLoginResponseDto {
    pub status: String,
    pub token: String,
    #[serde(rename = "userName")]
    pub user_name: String,
}

/// One owned review as shown on a profile page.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileReviewDto {
    pub id: String,
    #[serde(rename = "bookId")]
    pub book_id: String,
    pub title: Option<String>,
    pub rating: i32,
    pub content: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl ProfileReviewDto {
    pub fn from_model(review: &Review) -> Self {
        ProfileReviewDto {
            id: oid_hex(&review.id),
            book_id: review.book_id.to_hex(),
            title: review.title.to_owned(),
            rating: review.rating,
            content: review.content.to_owned(),
            created_at: bson_to_utc(review.created_at),
        }
    }
}

/// Minimal parent-review reference embedded in a profile comment. `None`
/// when the review has since been deleted (comments are not cascaded).
#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewRefDto {
    pub id: String,
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileCommentDto {
    pub id: String,
    pub content: String,
    pub review: Option<ReviewRefDto>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl ProfileCommentDto {
    pub fn from_model(comment: &Comment, review: Option<&Review>) -> Self {
        ProfileCommentDto {
            id: oid_hex(&comment.id),
            content: comment.content.to_owned(),
            review: review.map(|r| ReviewRefDto {
                id: oid_hex(&r.id),
                title: r.title.to_owned(),
            }),
            created_at: bson_to_utc(comment.created_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfileDto {
    pub id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    pub bio: Option<String>,
    #[serde(rename = "profilePicture")]
    pub profile_picture: Option<String>,
    pub reviews: Vec<ProfileReviewDto>,
    pub comments: Vec<ProfileCommentDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfileResponseDto {
    pub status: String,
    pub data: UserProfileDto,
}

// ============================================================================
// Book DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct BookCreateDto {
    #[validate(length(
        min = 2,
        max = 100,
        message = "Title must be between 2 and 100 characters"
    ))]
    pub title: String,

    #[validate(length(
        min = 2,
        max = 100,
        message = "Author must be between 2 and 100 characters"
    ))]
    pub author: String,

    #[validate(length(
        min = 10,
        max = 1000,
        message = "Description must be between 10 and 1000 characters"
    ))]
    pub description: String,

    #[validate(custom(function = "validate_genre"))]
    pub genre: Vec<String>,

    #[serde(rename = "publicationDate")]
    pub publication_date: NaiveDate,

    #[validate(range(min = 1, message = "Page count must be a positive integer"))]
    #[serde(rename = "pageCount")]
    pub page_count: i32,

    #[validate(url(message = "Cover must be a valid URL"))]
    pub cover: String,
}

fn validate_genre(genre: &Vec<String>) -> Result<(), validator::ValidationError> {
    if genre.is_empty() || genre.iter().any(|g| g.trim().is_empty()) {
        let mut err = validator::ValidationError::new("invalid_genre");
        err.message = Some("Genre must be a non-empty array of non-empty strings".into());
        return Err(err);
    }
    Ok(())
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct BookUpdateDto {
    #[validate(length(
        min = 2,
        max = 100,
        message = "Title must be between 2 and 100 characters"
    ))]
    pub title: Option<String>,

    #[validate(length(
        min = 2,
        max = 100,
        message = "Author must be between 2 and 100 characters"
    ))]
    pub author: Option<String>,

    #[validate(length(
        min = 10,
        max = 1000,
        message = "Description must be between 10 and 1000 characters"
    ))]
    pub description: Option<String>,

    #[validate(custom(function = "validate_genre"))]
    pub genre: Option<Vec<String>>,

    #[serde(rename = "publicationDate")]
    pub publication_date: Option<NaiveDate>,

    #[validate(range(min = 1, message = "Page count must be a positive integer"))]
    #[serde(rename = "pageCount")]
    pub page_count: Option<i32>,

    #[validate(url(message = "Cover must be a valid URL"))]
    pub cover: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookDto {
    pub id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub genre: Vec<String>,
    #[serde(rename = "publicationDate")]
    pub publication_date: NaiveDate,
    #[serde(rename = "pageCount")]
    pub page_count: i32,
    pub cover: String,
    #[serde(rename = "averageRating")]
    pub average_rating: Option<f64>,
    /// Ids of the book's reviews (the stored back-reference list).
    pub reviews: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl BookDto {
    pub fn from_model(book: &Book) -> Self {
        BookDto {
            id: oid_hex(&book.id),
            title: book.title.to_owned(),
            author: book.author.to_owned(),
            description: book.description.to_owned(),
            genre: book.genre.to_owned(),
            publication_date: bson_to_utc(book.publication_date).date_naive(),
            page_count: book.page_count,
            cover: book.cover.to_owned(),
            average_rating: book.average_rating,
            reviews: book.reviews.iter().map(|id| id.to_hex()).collect(),
            created_at: bson_to_utc(book.created_at),
            updated_at: bson_to_utc(book.updated_at),
        }
    }

    pub fn from_models(books: &[Book]) -> Vec<BookDto> {
        books.iter().map(BookDto::from_model).collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookResponseDto {
    pub status: String,
    pub data: BookDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookListResponseDto {
    pub status: String,
    pub data: Vec<BookDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationsResponseDto {
    pub status: String,
    pub results: usize,
    pub data: Vec<BookDto>,
}

// ============================================================================
// Review DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ReviewCreateDto {
    #[validate(length(min = 1, message = "Book id is required"))]
    #[serde(rename = "bookId")]
    pub book_id: String,

    #[validate(length(max = 100, message = "Title must be at most 100 characters"))]
    pub title: Option<String>,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,

    #[validate(length(
        min = 10,
        max = 2000,
        message = "Content must be between 10 and 2000 characters"
    ))]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct ReviewUpdateDto {
    #[validate(length(max = 100, message = "Title must be at most 100 characters"))]
    pub title: Option<String>,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i32>,

    #[validate(length(
        min = 10,
        max = 2000,
        message = "Content must be between 10 and 2000 characters"
    ))]
    pub content: Option<String>,
}

/// Review as listed under a book; `user_name` is joined from the author's
/// document and absent when the account has been deleted.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewDto {
    pub id: String,
    #[serde(rename = "bookId")]
    pub book_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    pub title: Option<String>,
    pub rating: i32,
    pub content: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl ReviewDto {
    pub fn from_model(review: &Review, user_name: Option<String>) -> Self {
        ReviewDto {
            id: oid_hex(&review.id),
            book_id: review.book_id.to_hex(),
            user_id: review.user_id.to_hex(),
            user_name,
            title: review.title.to_owned(),
            rating: review.rating,
            content: review.content.to_owned(),
            created_at: bson_to_utc(review.created_at),
            updated_at: bson_to_utc(review.updated_at),
        }
    }
}

/// Review as listed on the caller's own page, joined with the book title.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserReviewDto {
    pub id: String,
    #[serde(rename = "bookId")]
    pub book_id: String,
    #[serde(rename = "bookTitle")]
    pub book_title: Option<String>,
    pub title: Option<String>,
    pub rating: i32,
    pub content: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl UserReviewDto {
    pub fn from_model(review: &Review, book_title: Option<String>) -> Self {
        UserReviewDto {
            id: oid_hex(&review.id),
            book_id: review.book_id.to_hex(),
            book_title,
            title: review.title.to_owned(),
            rating: review.rating,
            content: review.content.to_owned(),
            created_at: bson_to_utc(review.created_at),
            updated_at: bson_to_utc(review.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SingleReviewResponseDto {
    pub status: String,
    pub data: ReviewDto,
}

#[derive(Debug, Serialize)]
pub struct ReviewListResponseDto {
    pub status: String,
    pub results: usize,
    pub data: Vec<ReviewDto>,
}

#[derive(Debug, Serialize)]
pub struct UserReviewListResponseDto {
    pub status: String,
    pub results: usize,
    pub data: Vec<UserReviewDto>,
}

// ============================================================================
// Comment DTOs
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CommentCreateDto {
    #[validate(length(min = 1, message = "Review id is required"))]
    #[serde(rename = "reviewId")]
    pub review_id: String,

    #[validate(length(
        min = 1,
        max = 1000,
        message = "Content must be between 1 and 1000 characters"
    ))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommentUpdateDto {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Content must be between 1 and 1000 characters"
    ))]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentDto {
    pub id: String,
    #[serde(rename = "reviewId")]
    pub review_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    pub content: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl CommentDto {
    pub fn from_model(comment: &Comment, user_name: Option<String>) -> Self {
        CommentDto {
            id: oid_hex(&comment.id),
            review_id: comment.review_id.to_hex(),
            user_id: comment.user_id.to_hex(),
            user_name,
            content: comment.content.to_owned(),
            created_at: bson_to_utc(comment.created_at),
            updated_at: bson_to_utc(comment.updated_at),
        }
    }
}

/// Comment as listed on the caller's own page, joined with its parent
/// review's title when the review still exists.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCommentDto {
    pub id: String,
    #[serde(rename = "reviewId")]
    pub review_id: String,
    #[serde(rename = "reviewTitle")]
    pub review_title: Option<String>,
    pub content: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl UserCommentDto {
    pub fn from_model(comment: &Comment, review_title: Option<String>) -> Self {
        UserCommentDto {
            id: oid_hex(&comment.id),
            review_id: comment.review_id.to_hex(),
            review_title,
            content: comment.content.to_owned(),
            created_at: bson_to_utc(comment.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SingleCommentResponseDto {
    pub status: String,
    pub data: CommentDto,
}

#[derive(Debug, Serialize)]
pub struct CommentListResponseDto {
    pub status: String,
    pub results: usize,
    pub data: Vec<CommentDto>,
}

#[derive(Debug, Serialize)]
pub struct UserCommentListResponseDto {
    pub status: String,
    pub results: usize,
    pub data: Vec<UserCommentDto>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_register() -> RegisterUserDto {
        RegisterUserDto {
            user_name: "yennefer".to_string(),
            email: "yen@aretuza.example".to_string(),
            password: "chaos-magic".to_string(),
            password_confirm: "chaos-magic".to_string(),
            role: "user".to_string(),
        }
    }

    #[test]
    fn register_accepts_valid_input() {
        assert!(valid_register().validate().is_ok());
    }

    #[test]
    fn register_rejects_password_mismatch() {
        let mut dto = valid_register();
        dto.password_confirm = "different".to_string();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn register_rejects_unknown_role() {
        let mut dto = valid_register();
        dto.role = "superuser".to_string();
        let err = dto.validate().unwrap_err().to_string();
        assert!(err.contains("admin"));
    }

    #[test]
    fn register_rejects_short_password() {
        let mut dto = valid_register();
        dto.password = "abc".to_string();
        dto.password_confirm = "abc".to_string();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn review_rating_out_of_bounds_is_rejected() {
        let mut dto = ReviewCreateDto {
            book_id: "64f0c1a2b3d4e5f601234567".to_string(),
            title: None,
            rating: 6,
            content: "Long enough review content.".to_string(),
        };
        assert!(dto.validate().is_err());

        dto.rating = 0;
        assert!(dto.validate().is_err());

        dto.rating = 5;
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn review_content_shorter_than_ten_chars_is_rejected() {
        let dto = ReviewCreateDto {
            book_id: "64f0c1a2b3d4e5f601234567".to_string(),
            title: None,
            rating: 3,
            content: "too short".to_string(),
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn comment_over_1000_chars_is_rejected() {
        let dto = CommentCreateDto {
            review_id: "64f0c1a2b3d4e5f601234567".to_string(),
            content: "x".repeat(1001),
        };
        assert!(dto.validate().is_err());

        let dto = CommentCreateDto {
            review_id: "64f0c1a2b3d4e5f601234567".to_string(),
            content: "x".repeat(1000),
        };
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn book_bounds_are_enforced() {
        let dto = BookCreateDto {
            title: "B".to_string(), // below 2-char minimum
            author: "Andrzej Sapkowski".to_string(),
            description: "A perfectly valid description.".to_string(),
            genre: vec!["Fantasy".to_string()],
            publication_date: NaiveDate::from_ymd_opt(1993, 1, 1).unwrap(),
            page_count: 288,
            cover: "https://covers.example/x.jpg".to_string(),
        };
        assert!(dto.validate().is_err());

        let dto = BookCreateDto {
            title: "Blood of Elves".to_string(),
            author: "Andrzej Sapkowski".to_string(),
            description: "A perfectly valid description.".to_string(),
            genre: vec![],
            publication_date: NaiveDate::from_ymd_opt(1994, 1, 1).unwrap(),
            page_count: 320,
            cover: "https://covers.example/x.jpg".to_string(),
        };
        assert!(dto.validate().is_err(), "empty genre list must fail");

        let dto = BookCreateDto {
            title: "Blood of Elves".to_string(),
            author: "Andrzej Sapkowski".to_string(),
            description: "A perfectly valid description.".to_string(),
            genre: vec!["Fantasy".to_string()],
            publication_date: NaiveDate::from_ymd_opt(1994, 1, 1).unwrap(),
            page_count: 0,
            cover: "https://covers.example/x.jpg".to_string(),
        };
        assert!(dto.validate().is_err(), "page count 0 must fail");

        let dto = BookCreateDto {
            title: "Blood of Elves".to_string(),
            author: "Andrzej Sapkowski".to_string(),
            description: "A perfectly valid description.".to_string(),
            genre: vec!["Fantasy".to_string()],
            publication_date: NaiveDate::from_ymd_opt(1994, 1, 1).unwrap(),
            page_count: 320,
            cover: "not a url".to_string(),
        };
        assert!(dto.validate().is_err(), "non-URL cover must fail");
    }

    #[test]
    fn pagination_defaults_pass_validation() {
        let q = BooksQueryParams::default();
        assert!(q.validate().is_ok());

        let q = BooksQueryParams {
            limit: Some(51),
            ..Default::default()
        };
        assert!(q.validate().is_err());
    }
}
