use serde::{Deserialize, Serialize};

/// Raw pagination query parameters. Values are clamped, never rejected:
/// `page` to at least 1, `limit` to the [1, 50] range (default 20).
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

pub const MAX_LIMIT: i64 = 50;

impl PaginationParams {
    pub fn page(&self) -> i64 {
        self.page.max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

/// Pagination block carried alongside every paginated listing,
/// computed from a parallel count query over the same predicate.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(total: i64, params: &PaginationParams) -> Self {
        let limit = params.limit();
        let total_pages = if total == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };
        Self {
            page: params.page(),
            limit,
            total,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_page_normalizes_to_one() {
        let params = PaginationParams { page: -1, limit: 20 };
        assert_eq!(params.page(), 1);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn limit_is_clamped_to_range() {
        let too_big = PaginationParams { page: 1, limit: 500 };
        assert_eq!(too_big.limit(), 50);

        let too_small = PaginationParams { page: 1, limit: 0 };
        assert_eq!(too_small.limit(), 1);
    }

    #[test]
    fn offset_uses_clamped_values() {
        let params = PaginationParams { page: 3, limit: 10 };
        assert_eq!(params.offset(), 20);
    }

    #[test]
    fn total_pages_rounds_up() {
        let params = PaginationParams { page: 1, limit: 20 };
        assert_eq!(Pagination::new(0, &params).total_pages, 0);
        assert_eq!(Pagination::new(20, &params).total_pages, 1);
        assert_eq!(Pagination::new(21, &params).total_pages, 2);
    }

    #[test]
    fn serializes_total_pages_camel_case() {
        let json = serde_json::to_value(Pagination::new(41, &PaginationParams::default()))
            .unwrap();
        assert_eq!(json["totalPages"], 3);
        assert_eq!(json["total"], 41);
    }
}
