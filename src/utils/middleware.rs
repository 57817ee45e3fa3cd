use crate::{error::AppError, state::AppState};
use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};
use governor::{
    clock::DefaultClock,
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use std::{
    net::SocketAddr,
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};
use tracing::{debug, info, warn};
use tokio::sync::OnceCell;

type KeyedRateLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;
static RATE_LIMITER: OnceCell<KeyedRateLimiter> = OnceCell::const_new();

/// 认证上下文中间件
/// 把认证服务放进请求扩展，供 User/OptionalUser 提取器使用
pub async fn auth_context_middleware(
    State(app_state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    request.extensions_mut().insert(app_state.auth_service.clone());
    request.extensions_mut().insert(app_state.profile_service.clone());

    Ok(next.run(request).await)
}

/// 速率限制中间件（按客户端IP）
pub async fn rate_limit_middleware(
    State(app_state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let rate_limiter = RATE_LIMITER.get_or_init(|| async {
        let quota = window_quota(
            app_state.config.rate_limit_requests,
            app_state.config.rate_limit_window,
        );
        RateLimiter::dashmap(quota)
    }).await;

    let client_ip = get_client_ip(&request);

    match rate_limiter.check_key(&client_ip) {
        Ok(_) => {
            debug!("Rate limit check passed for IP: {}", client_ip);
            Ok(next.run(request).await)
        }
        Err(_) => {
            warn!("Rate limit exceeded for IP: {}", client_ip);
            Err(AppError::RateLimitExceeded)
        }
    }
}

/// 窗口配额：requests 次每 window_secs 秒，令牌按 window/requests 匀速补充
fn window_quota(requests: u32, window_secs: u64) -> Quota {
    let requests = NonZeroU32::new(requests.max(1)).unwrap();
    let period = Duration::from_secs(window_secs.max(1)) / requests.get();

    Quota::with_period(period)
        .unwrap()
        .allow_burst(requests)
}

/// 请求日志中间件
pub async fn request_logging_middleware(
    request: Request<Body>,
    next: Next<Body>,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = get_client_ip(&request);

    let start_time = std::time::Instant::now();

    debug!("Incoming request: {} {} from {}", method, uri, client_ip);

    let response = next.run(request).await;

    let elapsed = start_time.elapsed();
    let status = response.status();

    info!(
        "Request completed: {} {} {} - {}ms",
        method,
        uri,
        status.as_u16(),
        elapsed.as_millis()
    );

    response
}

/// 获取客户端 IP 地址
fn get_client_ip(request: &Request<Body>) -> String {
    let headers = request.headers();

    // 检查常见的代理头
    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(ip_str) = forwarded_for.to_str() {
            if let Some(ip) = ip_str.split(',').next() {
                return ip.trim().to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.to_string();
        }
    }

    request
        .extensions()
        .get::<SocketAddr>()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_quota_follows_config() {
        // 100次/60秒：突发上限100，补充间隔600ms
        let quota = window_quota(100, 60);
        assert_eq!(quota.burst_size().get(), 100);
        assert_eq!(quota.replenish_interval(), Duration::from_millis(600));

        // 窗口改成120秒后补充间隔翻倍
        let quota = window_quota(100, 120);
        assert_eq!(quota.replenish_interval(), Duration::from_millis(1200));
    }

    #[test]
    fn test_window_quota_clamps_zero_config() {
        let quota = window_quota(0, 0);
        assert_eq!(quota.burst_size().get(), 1);
        assert_eq!(quota.replenish_interval(), Duration::from_secs(1));
    }
}
