pub mod auth;
pub mod book;
pub mod comment;
pub mod review;
pub mod users;
