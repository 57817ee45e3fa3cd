use serde::{Deserialize, Serialize};

/// 列表接口统一的分页上限
pub const MAX_PAGE_LIMIT: usize = 50;
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// 规范化后的分页参数（页码从1开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
}

impl Pagination {
    /// 规范化调用方传入的分页参数：页码至少为1，limit收敛到 [1, MAX_PAGE_LIMIT]
    pub fn from_params(page: Option<usize>, limit: Option<usize>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        Self { page, limit }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1) * self.limit
    }
}

/// 分页结果结构
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaginatedResult<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
    pub has_more: bool,
}

impl<T> PaginatedResult<T> {
    /// 组装分页元信息，不变式：has_more == (total > offset + limit)
    pub fn new(data: Vec<T>, total: usize, pagination: Pagination) -> Self {
        let Pagination { page, limit } = pagination;
        Self {
            data,
            total,
            page,
            limit,
            total_pages: (total + limit - 1) / limit,
            has_more: total > pagination.offset() + limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(total: usize, page: usize, limit: usize) -> PaginatedResult<()> {
        PaginatedResult::new(Vec::new(), total, Pagination { page, limit })
    }

    #[test]
    fn test_clamping() {
        let p = Pagination::from_params(None, None);
        assert_eq!(p, Pagination { page: 1, limit: DEFAULT_PAGE_LIMIT });

        let p = Pagination::from_params(Some(0), Some(500));
        assert_eq!(p, Pagination { page: 1, limit: MAX_PAGE_LIMIT });

        let p = Pagination::from_params(Some(3), Some(10));
        assert_eq!(p.offset(), 20);
    }

    #[test]
    fn test_has_more_boundaries() {
        // total 恰好整除 limit：最后一页 has_more 为 false
        assert!(meta(40, 1, 20).has_more);
        assert!(!meta(40, 2, 20).has_more);

        // total = 0
        let empty = meta(0, 1, 20);
        assert!(!empty.has_more);
        assert_eq!(empty.total_pages, 0);

        // total = 1
        let one = meta(1, 1, 20);
        assert!(!one.has_more);
        assert_eq!(one.total_pages, 1);

        // 不整除：最后一页之前 has_more 为 true
        assert!(meta(41, 2, 20).has_more);
        assert!(!meta(41, 3, 20).has_more);
    }
}
