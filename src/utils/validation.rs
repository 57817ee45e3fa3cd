use crate::error::{AppError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{3,30}$").unwrap());

/// 验证用户名格式：3-30位，字母数字和下划线
pub fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(AppError::Validation("Username cannot be empty".to_string()));
    }

    if !USERNAME_PATTERN.is_match(username) {
        return Err(AppError::Validation(
            "Username must be 3-30 characters of letters, digits and underscores".to_string(),
        ));
    }

    Ok(())
}

/// 验证帖子正文：非空且不超过280字符
pub fn validate_post_content(content: &str) -> Result<()> {
    validate_content(content, 280, "Post")
}

/// 验证评论正文：非空且不超过200字符
pub fn validate_comment_content(content: &str) -> Result<()> {
    validate_content(content, 200, "Comment")
}

fn validate_content(content: &str, max_chars: usize, what: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(AppError::Validation(format!("{} content cannot be empty", what)));
    }

    // 按字符计数而不是字节，避免多字节内容被误拒
    let chars = content.chars().count();
    if chars > max_chars {
        return Err(AppError::Validation(format!(
            "{} content exceeds {} characters (got {})",
            what, max_chars, chars
        )));
    }

    Ok(())
}

/// 上传前的图片校验：大小上限与MIME白名单
pub fn validate_image_upload(
    content_type: &str,
    size: usize,
    max_size: usize,
    allowed_types: &str,
) -> Result<()> {
    if size == 0 {
        return Err(AppError::FileUpload("Uploaded file is empty".to_string()));
    }

    if size > max_size {
        return Err(AppError::FileUpload(format!(
            "File size {} exceeds the {} byte limit",
            size, max_size
        )));
    }

    let allowed = allowed_types
        .split(',')
        .map(|t| t.trim())
        .any(|t| t.eq_ignore_ascii_case(content_type));

    if !allowed {
        return Err(AppError::FileUpload(format!(
            "Unsupported content type: {} (allowed: {})",
            content_type, allowed_types
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert!(validate_username("ana_belle42").is_ok());
        assert!(validate_username("abc").is_ok());
        assert!(validate_username("a".repeat(30).as_str()).is_ok());

        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(31)).is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username("bad-name").is_err());
        assert!(validate_username("").is_err());
    }

    #[test]
    fn test_content_limits() {
        assert!(validate_post_content("hello").is_ok());
        assert!(validate_post_content(&"x".repeat(280)).is_ok());
        assert!(validate_post_content(&"x".repeat(281)).is_err());
        assert!(validate_post_content("   ").is_err());

        assert!(validate_comment_content(&"x".repeat(200)).is_ok());
        assert!(validate_comment_content(&"x".repeat(201)).is_err());
    }

    #[test]
    fn test_image_upload_rules() {
        let allowed = "image/jpeg,image/png";
        let max = 2 * 1024 * 1024;

        assert!(validate_image_upload("image/jpeg", 1024, max, allowed).is_ok());
        assert!(validate_image_upload("image/png", max, max, allowed).is_ok());

        assert!(validate_image_upload("image/png", max + 1, max, allowed).is_err());
        assert!(validate_image_upload("image/gif", 1024, max, allowed).is_err());
        assert!(validate_image_upload("image/jpeg", 0, max, allowed).is_err());
    }
}
