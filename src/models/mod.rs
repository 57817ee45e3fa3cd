pub mod admin;
pub mod comment;
pub mod feed;
pub mod follow;
pub mod like;
pub mod notification;
pub mod post;
pub mod profile;
