use crate::{
    error::{AppError, Result},
    models::follow::*,
    models::notification::{CreateNotification, NotificationType},
    services::{Database, FeedService, NotificationService, ProfileService},
    utils::pagination::{PaginatedResult, Pagination},
};
use chrono::Utc;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// 关注服务
/// 关注关系变化会让关注者的 feed 缓存失效
#[derive(Clone)]
pub struct FollowService {
    db: Arc<Database>,
    profiles: ProfileService,
    notifications: NotificationService,
    feed: FeedService,
}

impl FollowService {
    pub fn new(
        db: Arc<Database>,
        profiles: ProfileService,
        notifications: NotificationService,
        feed: FeedService,
    ) -> Self {
        Self {
            db,
            profiles,
            notifications,
            feed,
        }
    }

    /// 关注用户：禁止自关注，重复关注报 Conflict
    pub async fn follow_user(&self, user_id: &str, target_id: &str) -> Result<()> {
        if user_id == target_id {
            return Err(AppError::bad_request("You cannot follow yourself"));
        }

        self.profiles.require_profile(target_id).await?;

        if self.is_following(user_id, target_id).await? {
            return Err(AppError::conflict("Already following this user"));
        }

        let follow = Follow {
            id: Uuid::new_v4().to_string(),
            follower_id: user_id.to_string(),
            following_id: target_id.to_string(),
            created_at: Utc::now(),
        };
        self.db.create("follow", &follow.id, &follow).await?;

        self.recompute_follow_counts(user_id, target_id).await?;
        self.feed.invalidate_viewer(user_id);

        if let Err(e) = self
            .notifications
            .create(CreateNotification {
                recipient_id: target_id.to_string(),
                sender_id: user_id.to_string(),
                notification_type: NotificationType::Follow,
                post_id: None,
            })
            .await
        {
            warn!("Failed to create follow notification: {}", e);
        }

        info!("User {} followed {}", user_id, target_id);
        Ok(())
    }

    /// 取消关注：未关注时报 NotFound
    pub async fn unfollow_user(&self, user_id: &str, target_id: &str) -> Result<()> {
        self.profiles.require_profile(target_id).await?;

        let mut response = self.db.query_with_params(
            "DELETE follow WHERE follower_id = $follower AND following_id = $following \
             RETURN meta::id(id) AS id",
            json!({ "follower": user_id, "following": target_id }),
        ).await?;

        let deleted: Vec<serde_json::Value> = response.take(0)?;
        if deleted.is_empty() {
            return Err(AppError::not_found("Follow relationship"));
        }

        self.recompute_follow_counts(user_id, target_id).await?;
        self.feed.invalidate_viewer(user_id);

        info!("User {} unfollowed {}", user_id, target_id);
        Ok(())
    }

    pub async fn is_following(&self, follower_id: &str, following_id: &str) -> Result<bool> {
        let count = self.db.count(
            "SELECT count() AS count FROM follow \
             WHERE follower_id = $follower AND following_id = $following GROUP ALL",
            json!({ "follower": follower_id, "following": following_id }),
        ).await?;

        Ok(count > 0)
    }

    /// 关注统计，viewer 在场时附带双向关系
    pub async fn get_stats(&self, user_id: &str, viewer_id: Option<&str>) -> Result<FollowStats> {
        let profile = self.profiles.require_profile(user_id).await?;

        let (is_following, is_followed_by) = match viewer_id {
            Some(viewer) if viewer != user_id => (
                self.is_following(viewer, user_id).await?,
                self.is_following(user_id, viewer).await?,
            ),
            _ => (false, false),
        };

        Ok(FollowStats {
            followers_count: profile.follower_count,
            following_count: profile.following_count,
            is_following,
            is_followed_by,
        })
    }

    /// 粉丝列表，viewer 的关注状态批量合并
    pub async fn get_followers(
        &self,
        user_id: &str,
        viewer_id: Option<&str>,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> Result<PaginatedResult<FollowUserInfo>> {
        self.list_related(user_id, viewer_id, page, limit, Direction::Followers)
            .await
    }

    /// 关注列表
    pub async fn get_following(
        &self,
        user_id: &str,
        viewer_id: Option<&str>,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> Result<PaginatedResult<FollowUserInfo>> {
        self.list_related(user_id, viewer_id, page, limit, Direction::Following)
            .await
    }

    async fn list_related(
        &self,
        user_id: &str,
        viewer_id: Option<&str>,
        page: Option<usize>,
        limit: Option<usize>,
        direction: Direction,
    ) -> Result<PaginatedResult<FollowUserInfo>> {
        self.profiles.require_profile(user_id).await?;

        let pagination = Pagination::from_params(page, limit);

        let (match_col, pick_col) = match direction {
            Direction::Followers => ("following_id", "follower_id"),
            Direction::Following => ("follower_id", "following_id"),
        };

        let sql = format!(
            "SELECT {} AS related_id FROM follow WHERE {} = $user \
             ORDER BY created_at DESC LIMIT $limit START $offset",
            pick_col, match_col
        );
        let mut response = self.db.query_with_params(
            &sql,
            json!({
                "user": user_id,
                "limit": pagination.limit,
                "offset": pagination.offset(),
            }),
        ).await?;

        let rows: Vec<serde_json::Value> = response.take(0)?;
        let related_ids: Vec<String> = rows
            .into_iter()
            .filter_map(|row| {
                row.get("related_id")
                    .and_then(|v| v.as_str())
                    .map(String::from)
            })
            .collect();

        let count_sql = format!(
            "SELECT count() AS count FROM follow WHERE {} = $user GROUP ALL",
            match_col
        );
        let total = self.db.count(&count_sql, json!({ "user": user_id })).await?;

        let items = self
            .build_user_infos(&related_ids, viewer_id)
            .await?;

        Ok(PaginatedResult::new(items, total, pagination))
    }

    /// 拼装列表用户信息，viewer 的双向关注状态各走一次批量查询
    async fn build_user_infos(
        &self,
        user_ids: &[String],
        viewer_id: Option<&str>,
    ) -> Result<Vec<FollowUserInfo>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut response = self.db.query_with_params(
            "SELECT meta::id(id) AS id, username, avatar_url, bio, follower_count \
             FROM profile WHERE meta::id(id) IN $ids",
            json!({ "ids": user_ids }),
        ).await?;
        let mut infos: Vec<FollowUserInfo> = response.take(0)?;

        if let Some(viewer) = viewer_id {
            let following = self.following_set(viewer, user_ids).await?;
            let followed_by = self.followed_by_set(viewer, user_ids).await?;

            for info in infos.iter_mut() {
                info.is_following = following.contains(&info.id);
                info.is_followed_back = followed_by.contains(&info.id);
            }
        }

        // 保持关注时间顺序
        let order: std::collections::HashMap<&String, usize> = user_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();
        infos.sort_by_key(|info| order.get(&info.id).copied().unwrap_or(usize::MAX));

        Ok(infos)
    }

    /// viewer 关注了名单里的哪些人
    async fn following_set(&self, viewer_id: &str, user_ids: &[String]) -> Result<HashSet<String>> {
        let mut response = self.db.query_with_params(
            "SELECT following_id FROM follow \
             WHERE follower_id = $viewer AND following_id IN $ids",
            json!({ "viewer": viewer_id, "ids": user_ids }),
        ).await?;

        let rows: Vec<serde_json::Value> = response.take(0)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                row.get("following_id")
                    .and_then(|v| v.as_str())
                    .map(String::from)
            })
            .collect())
    }

    /// 名单里有哪些人关注了 viewer
    async fn followed_by_set(&self, viewer_id: &str, user_ids: &[String]) -> Result<HashSet<String>> {
        let mut response = self.db.query_with_params(
            "SELECT follower_id FROM follow \
             WHERE following_id = $viewer AND follower_id IN $ids",
            json!({ "viewer": viewer_id, "ids": user_ids }),
        ).await?;

        let rows: Vec<serde_json::Value> = response.take(0)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                row.get("follower_id")
                    .and_then(|v| v.as_str())
                    .map(String::from)
            })
            .collect())
    }

    /// 双方的冗余计数都从 follow 表重算
    async fn recompute_follow_counts(&self, follower_id: &str, following_id: &str) -> Result<()> {
        self.db.query_with_params(
            "LET $following = (SELECT count() AS count FROM follow \
               WHERE follower_id = $follower_id GROUP ALL)[0].count ?? 0; \
             UPDATE type::thing('profile', $follower_id) SET following_count = $following RETURN NONE; \
             LET $followers = (SELECT count() AS count FROM follow \
               WHERE following_id = $following_id GROUP ALL)[0].count ?? 0; \
             UPDATE type::thing('profile', $following_id) SET follower_count = $followers RETURN NONE",
            json!({ "follower_id": follower_id, "following_id": following_id }),
        ).await?;
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Followers,
    Following,
}
