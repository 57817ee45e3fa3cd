pub mod admin;
pub mod auth;
pub mod comment;
pub mod database;
pub mod feed;
pub mod follow;
pub mod media;
pub mod notification;
pub mod post;
pub mod profile;
pub mod realtime;

pub use admin::AdminService;
pub use auth::AuthService;
pub use comment::CommentService;
pub use database::Database;
pub use feed::FeedService;
pub use follow::FollowService;
pub use media::MediaService;
pub use notification::NotificationService;
pub use post::PostService;
pub use profile::ProfileService;
pub use realtime::RealtimeService;
