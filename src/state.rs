use crate::{
    config::Config,
    services::{
        admin::AdminService,
        auth::AuthService,
        comment::CommentService,
        database::Database,
        feed::FeedService,
        follow::FollowService,
        media::MediaService,
        notification::NotificationService,
        post::PostService,
        profile::ProfileService,
        realtime::RealtimeService,
    },
};
use std::sync::Arc;

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 数据库连接
    pub db: Arc<Database>,

    /// 认证服务
    pub auth_service: Arc<AuthService>,

    /// 用户档案服务
    pub profile_service: ProfileService,

    /// 帖子服务
    pub post_service: PostService,

    /// 评论服务
    pub comment_service: CommentService,

    /// 关注服务
    pub follow_service: FollowService,

    /// Feed 组装服务
    pub feed_service: FeedService,

    /// 通知服务
    pub notification_service: NotificationService,

    /// 实时订阅服务
    pub realtime_service: Arc<RealtimeService>,

    /// 媒体服务
    pub media_service: MediaService,

    /// 管理服务
    pub admin_service: AdminService,
}
