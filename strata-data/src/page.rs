use serde::{Deserialize, Serialize};

/// Resolved pagination parameters. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pageable {
    pub page: u64,
    pub limit: u64,
}

impl Default for Pageable {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

impl Pageable {
    /// Clamp `page` to at least 1 and `limit` into `1..=max_limit`.
    pub fn clamped(page: u64, limit: u64, max_limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, max_limit.max(1)),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Pagination metadata attached to list responses.
///
/// `total` counts every visible record, `results` the records matching the
/// request's filters. The page fields are present only for paginated reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub results: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_items_count: Option<u64>,
}

impl PageMeta {
    pub fn unpaginated(total: u64, results: u64) -> Self {
        Self {
            total,
            results,
            page: None,
            limit: None,
            total_pages: None,
            remaining_items: None,
            page_items_count: None,
        }
    }

    pub fn paginated(total: u64, results: u64, pageable: &Pageable, page_items_count: u64) -> Self {
        let total_pages = if pageable.limit == 0 {
            0
        } else {
            results.div_ceil(pageable.limit)
        };
        Self {
            total,
            results,
            page: Some(pageable.page),
            limit: Some(pageable.limit),
            total_pages: Some(total_pages),
            remaining_items: Some(results.saturating_sub(pageable.page.saturating_mul(pageable.limit))),
            page_items_count: Some(page_items_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped() {
        assert_eq!(Pageable::clamped(0, 500, 100), Pageable { page: 1, limit: 100 });
        assert_eq!(Pageable::clamped(3, 0, 100), Pageable { page: 3, limit: 1 });
        assert_eq!(Pageable::clamped(3, 20, 100).offset(), 40);
    }

    #[test]
    fn test_last_page_has_no_remaining_items() {
        let p = Pageable { page: 3, limit: 10 };
        let meta = PageMeta::paginated(30, 25, &p, 5);
        assert_eq!(meta.total_pages, Some(3));
        assert_eq!(meta.remaining_items, Some(0));
    }

    #[test]
    fn test_beyond_last_page_never_negative() {
        let p = Pageable { page: 9, limit: 10 };
        let meta = PageMeta::paginated(25, 25, &p, 0);
        assert_eq!(meta.remaining_items, Some(0));
        assert_eq!(meta.page_items_count, Some(0));
    }

    #[test]
    fn test_unpaginated_omits_page_fields() {
        let json = serde_json::to_value(PageMeta::unpaginated(4, 2)).unwrap();
        assert_eq!(json, serde_json::json!({ "total": 4, "results": 2 }));
    }
}
