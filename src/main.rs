use std::sync::Arc;
use axum::{
    routing::{get, Router},
    http::{HeaderValue, Method},
    middleware,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing::{error, info, warn};
use tokio::time::{interval, Duration};

mod routes;
mod models;
mod services;
mod config;
mod error;
mod state;
mod utils;

use crate::{
    config::Config,
    state::AppState,
    services::{
        realtime::LocalChangeFeed,
        AdminService,
        AuthService,
        CommentService,
        Database,
        FeedService,
        FollowService,
        MediaService,
        NotificationService,
        PostService,
        ProfileService,
        RealtimeService,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("LOG_LEVEL").unwrap_or_else(|_| "rainbow_social=debug,tower_http=debug".into())
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rainbow-Social service...");

    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    if config.is_production() {
        info!("Running in production mode");
    }

    // 初始化数据库连接
    let db = Arc::new(match Database::new(&config).await {
        Ok(db) => {
            match db.verify_connection().await {
                Ok(_) => {
                    info!("Database connection established successfully");
                    db
                }
                Err(e) => {
                    warn!("Database connection failed: {}", e);

                    // 只在开发环境尝试拉起内存数据库
                    if !config.is_development() {
                        error!("Database unreachable: {}", e);
                        return Err(anyhow::anyhow!("Database connection failed"));
                    }
                    info!("Attempting to auto-start database...");

                    if let Err(start_err) = auto_start_database(&config).await {
                        error!("Failed to auto-start database: {}. Original error: {}", start_err, e);
                        return Err(anyhow::anyhow!("Database connection failed"));
                    }

                    // 重新尝试连接
                    let db = Database::new(&config).await?;
                    db.verify_connection().await?;
                    info!("Database auto-started and connected successfully");
                    db
                }
            }
        }
        Err(e) => {
            error!("Failed to create database connection: {}", e);
            return Err(anyhow::anyhow!("Database initialization failed"));
        }
    });

    // 进程内事件总线：通知写入方发布，WebSocket 通道消费
    let change_feed = Arc::new(LocalChangeFeed::new());

    // 初始化所有服务
    let auth_service = Arc::new(AuthService::new(&config)?);
    let profile_service = ProfileService::new(db.clone());
    let notification_service = NotificationService::new(
        db.clone(),
        profile_service.clone(),
        change_feed.clone(),
        config.notification_retention_days,
    );
    let post_service = PostService::new(db.clone(), profile_service.clone(), notification_service.clone());
    let comment_service = CommentService::new(
        db.clone(),
        profile_service.clone(),
        post_service.clone(),
        notification_service.clone(),
    );
    let feed_service = FeedService::new(
        db.clone(),
        profile_service.clone(),
        post_service.clone(),
        config.feed_cache_ttl,
    );
    let follow_service = FollowService::new(
        db.clone(),
        profile_service.clone(),
        notification_service.clone(),
        feed_service.clone(),
    );
    let realtime_service = Arc::new(RealtimeService::new(change_feed));
    let media_service = MediaService::new(&config)?;
    let admin_service = AdminService::new(db.clone(), profile_service.clone());

    // 创建应用状态
    let app_state = Arc::new(AppState {
        config: config.clone(),
        db,
        auth_service,
        profile_service,
        post_service,
        comment_service,
        follow_service,
        feed_service,
        notification_service,
        realtime_service,
        media_service,
        admin_service,
    });

    // 启动后台任务
    start_background_tasks(app_state.clone()).await;

    // 配置 CORS
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(
            config.cors_allowed_origins
                .split(',')
                .map(|origin| origin.parse::<HeaderValue>().unwrap())
                .collect::<Vec<_>>(),
        );

    // 构建应用路由 - 使用/api/social/前缀避免网关路由冲突
    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .nest("/api/social/users", routes::users::router())
        .nest("/api/social/posts", routes::posts::router())
        .nest("/api/social/comments", routes::comments::router())
        .nest("/api/social/feed", routes::feed::router())
        .nest("/api/social/follows", routes::follows::router())
        .nest("/api/social/notifications", routes::notifications::router())
        .nest("/api/social/realtime", routes::realtime::router())
        .nest("/api/social/media", routes::media::router())
        .nest("/api/social/admin", routes::admin::router())
        .layer(middleware::from_fn_with_state(app_state.clone(), utils::middleware::auth_context_middleware))
        .layer(middleware::from_fn_with_state(app_state.clone(), utils::middleware::rate_limit_middleware))
        .layer(middleware::from_fn(utils::middleware::request_logging_middleware))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // 启动主服务器
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "Rainbow-Social is running!"
}

async fn auto_start_database(config: &Config) -> anyhow::Result<()> {
    info!("Attempting to start SurrealDB...");

    let output = tokio::process::Command::new("surreal")
        .args(&[
            "start",
            "--user", &config.database_username,
            "--pass", &config.database_password,
            "memory",
        ])
        .spawn();

    match output {
        Ok(_) => {
            info!("SurrealDB started successfully");
            // 等待数据库启动
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok(())
        }
        Err(e) => {
            error!("Failed to start SurrealDB: {}", e);
            Err(anyhow::anyhow!("Failed to start database"))
        }
    }
}

async fn start_background_tasks(app_state: Arc<AppState>) {
    info!("Starting background tasks...");

    // 通知保留期清理任务
    let retention_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(
            retention_state.config.retention_sweep_interval,
        ));

        loop {
            interval.tick().await;
            if let Err(e) = retention_state.notification_service.purge_expired().await {
                error!("Failed to purge expired notifications: {}", e);
            }
        }
    });

    // feed 缓存的过期项清理任务
    let cache_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;
            cache_state.feed_service.purge_cache();
        }
    });

    // 清理过期的用户认证缓存
    let auth_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(3600));

        loop {
            interval.tick().await;
            auth_state.auth_service.cleanup_expired_cache().await;
        }
    });
}
