use crate::{
    error::{AppError, Result},
    models::admin::AdminProfileUpdate,
    models::profile::Profile,
    services::{Database, ProfileService},
    utils::pagination::{PaginatedResult, Pagination},
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// 管理服务，所有入口都先校验调用方的管理员身份
#[derive(Clone)]
pub struct AdminService {
    db: Arc<Database>,
    profiles: ProfileService,
}

impl AdminService {
    pub fn new(db: Arc<Database>, profiles: ProfileService) -> Self {
        Self { db, profiles }
    }

    pub async fn require_admin(&self, user_id: &str) -> Result<()> {
        if self.profiles.is_admin(user_id).await? {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin access required"))
        }
    }

    /// 用户列表，可按用户名模糊搜索
    pub async fn list_profiles(
        &self,
        admin_id: &str,
        page: Option<usize>,
        limit: Option<usize>,
        search: Option<&str>,
    ) -> Result<PaginatedResult<Profile>> {
        self.require_admin(admin_id).await?;

        let pagination = Pagination::from_params(page, limit);

        let search_filter = if search.is_some() {
            " WHERE username CONTAINS $search"
        } else {
            ""
        };

        let sql = format!(
            "SELECT *, meta::id(id) AS id FROM profile{} \
             ORDER BY created_at DESC LIMIT $limit START $offset",
            search_filter
        );
        let mut response = self.db.query_with_params(
            &sql,
            json!({
                "search": search.unwrap_or_default(),
                "limit": pagination.limit,
                "offset": pagination.offset(),
            }),
        ).await?;
        let profiles: Vec<Profile> = response.take(0)?;

        let count_sql = format!(
            "SELECT count() AS count FROM profile{} GROUP ALL",
            search_filter
        );
        let total = self.db.count(
            &count_sql,
            json!({ "search": search.unwrap_or_default() }),
        ).await?;

        Ok(PaginatedResult::new(profiles, total, pagination))
    }

    /// 管理员更新用户档案：角色、可见性、封禁状态
    /// 请求体是封闭联合，未知字段在反序列化阶段就被拒绝
    pub async fn update_profile(
        &self,
        admin_id: &str,
        target_id: &str,
        update: AdminProfileUpdate,
    ) -> Result<Profile> {
        self.require_admin(admin_id).await?;

        if update.is_empty() {
            return Err(AppError::validation("No fields to update"));
        }

        self.profiles.require_profile(target_id).await?;

        let mut sets = Vec::new();
        let mut params = json!({
            "id": target_id,
            "now": Utc::now(),
        });

        if let Some(role) = &update.role {
            sets.push("role = $role");
            params["role"] = json!(role);
        }

        if let Some(visibility) = &update.visibility {
            sets.push("visibility = $visibility");
            params["visibility"] = json!(visibility);
        }

        if let Some(is_active) = update.is_active {
            sets.push("is_active = $is_active");
            params["is_active"] = json!(is_active);
        }

        sets.push("updated_at = $now");

        let query = format!(
            "UPDATE type::thing('profile', $id) SET {} RETURN NONE",
            sets.join(", ")
        );
        self.db.query_with_params(&query, params).await?;

        info!("Admin {} updated profile {}", admin_id, target_id);
        self.profiles.require_profile(target_id).await
    }
}
