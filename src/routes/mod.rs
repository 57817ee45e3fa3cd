pub mod admin;
pub mod comments;
pub mod feed;
pub mod follows;
pub mod media;
pub mod notifications;
pub mod posts;
pub mod realtime;
pub mod users;
