use crate::models::profile::{ProfileVisibility, UserRole};
use serde::{Deserialize, Serialize};

/// 管理员可修改的主页字段，封闭集合
/// 不接受任意字段合并，未知字段直接拒绝
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminProfileUpdate {
    pub role: Option<UserRole>,
    pub visibility: Option<ProfileVisibility>,
    pub is_active: Option<bool>,
}

impl AdminProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.visibility.is_none() && self.is_active.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<AdminProfileUpdate, _> =
            serde_json::from_str(r#"{"role":"admin","password":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_closed_union_parses() {
        let update: AdminProfileUpdate =
            serde_json::from_str(r#"{"visibility":"followers_only","is_active":false}"#).unwrap();
        assert_eq!(update.visibility, Some(ProfileVisibility::FollowersOnly));
        assert_eq!(update.is_active, Some(false));
        assert!(update.role.is_none());
        assert!(!update.is_empty());
    }
}
