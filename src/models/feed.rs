use crate::{
    models::post::{PostCategory, PostResponse},
    utils::pagination::PaginatedResult,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Feed 模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedType {
    Personalized,
    Public,
    Trending,
    Category,
}

impl Default for FeedType {
    fn default() -> Self {
        FeedType::Public
    }
}

/// 热门榜回看窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFrame {
    Hour,
    Day,
    Week,
}

impl Default for TimeFrame {
    fn default() -> Self {
        TimeFrame::Day
    }
}

impl TimeFrame {
    pub fn duration(&self) -> Duration {
        match self {
            TimeFrame::Hour => Duration::hours(1),
            TimeFrame::Day => Duration::days(1),
            TimeFrame::Week => Duration::weeks(1),
        }
    }
}

/// 组合 feed 入口的完整参数
#[derive(Debug, Clone, Default)]
pub struct FeedOptions {
    pub feed_type: FeedType,
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub category: Option<PostCategory>,
    pub timeframe: Option<TimeFrame>,
    /// 作者白名单，空表示不过滤
    pub author_ids: Vec<String>,
    /// 作者黑名单
    pub exclude_author_ids: Vec<String>,
}

/// Feed 响应：{posts, total, page, limit, total_pages, has_more}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedResponse {
    pub posts: Vec<PostResponse>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
    pub has_more: bool,
}

impl From<PaginatedResult<PostResponse>> for FeedResponse {
    fn from(result: PaginatedResult<PostResponse>) -> Self {
        Self {
            posts: result.data,
            total: result.total,
            page: result.page,
            limit: result.limit,
            total_pages: result.total_pages,
            has_more: result.has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_durations() {
        assert_eq!(TimeFrame::Hour.duration(), Duration::hours(1));
        assert_eq!(TimeFrame::Day.duration(), Duration::hours(24));
        assert_eq!(TimeFrame::Week.duration(), Duration::days(7));
    }

    #[test]
    fn test_feed_type_wire_format() {
        let t: FeedType = serde_json::from_str(r#""personalized""#).unwrap();
        assert_eq!(t, FeedType::Personalized);
        assert_eq!(serde_json::to_string(&FeedType::Trending).unwrap(), r#""trending""#);
    }
}
