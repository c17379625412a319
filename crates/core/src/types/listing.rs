//! Primitives shared by every list view: sorting, pagination and bulk
//! selection.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Sort direction for list queries. Lists default to newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Lenient parse for query strings; anything unrecognized means `Desc`.
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }

    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested page of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    per_page: u32,
}

impl Pagination {
    /// Create a pagination request. Page numbers start at 1; zero (or a
    /// missing page) is treated as the first page, and `per_page` is at
    /// least 1.
    #[must_use]
    pub fn new(page: Option<u32>, per_page: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.max(1),
        }
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn per_page(&self) -> u32 {
        self.per_page
    }

    /// SQL `OFFSET` for this page.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    /// SQL `LIMIT` for this page.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    /// Number of pages needed for `total` rows; never less than 1.
    #[must_use]
    pub fn total_pages(&self, total: i64) -> u32 {
        if total <= 0 {
            return 1;
        }
        let per_page = i64::from(self.per_page);
        let pages = (total + per_page - 1) / per_page;
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
}

/// One page of results plus the numbers a paginator needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub last_page: u32,
    /// 1-based index of the first item on this page (0 when empty).
    pub from: i64,
    /// 1-based index of the last item on this page (0 when empty).
    pub to: i64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        let count = i64::try_from(items.len()).unwrap_or(i64::MAX);
        let (from, to) = if count == 0 {
            (0, 0)
        } else {
            let from = pagination.offset() + 1;
            (from, from + count - 1)
        };

        Self {
            items,
            total,
            page: pagination.page(),
            per_page: pagination.per_page(),
            last_page: pagination.total_pages(total),
            from,
            to,
        }
    }

    /// Transform the items while keeping the paging numbers.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            last_page: self.last_page,
            from: self.from,
            to: self.to,
        }
    }
}

/// Which rows a bulk action applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkSelection {
    /// Only the explicitly checked rows.
    Ids(Vec<i32>),
    /// Every row matching the active filters, across all pages.
    AllMatching,
}

impl BulkSelection {
    /// Resolve a bulk request. `all_matching` wins over any listed ids.
    #[must_use]
    pub fn from_request(all_matching: bool, ids: &str) -> Self {
        if all_matching {
            Self::AllMatching
        } else {
            Self::Ids(parse_id_list(ids))
        }
    }

    /// True when nothing would be affected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Ids(ids) if ids.is_empty())
    }
}

/// Parse a comma-separated id list, skipping blanks and anything that is not
/// a positive integer. Duplicates are removed, first occurrence kept.
#[must_use]
pub fn parse_id_list(raw: &str) -> Vec<i32> {
    let mut ids: Vec<i32> = Vec::new();
    for id in raw
        .split(',')
        .filter_map(|s| s.trim().parse::<i32>().ok())
        .filter(|id| *id > 0)
    {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_direction_defaults_to_desc() {
        assert_eq!(SortDirection::default(), SortDirection::Desc);
        assert_eq!(SortDirection::from_query(None), SortDirection::Desc);
        assert_eq!(SortDirection::from_query(Some("sideways")), SortDirection::Desc);
        assert_eq!(SortDirection::from_query(Some("ASC")), SortDirection::Asc);
        assert_eq!(SortDirection::Asc.as_sql(), "ASC");
    }

    #[test]
    fn test_pagination_clamps_page() {
        let p = Pagination::new(Some(0), 25);
        assert_eq!(p.page(), 1);
        assert_eq!(p.offset(), 0);

        let p = Pagination::new(None, 0);
        assert_eq!(p.per_page(), 1);
    }

    #[test]
    fn test_pagination_offset_and_pages() {
        let p = Pagination::new(Some(3), 25);
        assert_eq!(p.offset(), 50);
        assert_eq!(p.limit(), 25);
        assert_eq!(p.total_pages(0), 1);
        assert_eq!(p.total_pages(25), 1);
        assert_eq!(p.total_pages(26), 2);
        assert_eq!(p.total_pages(101), 5);
    }

    #[test]
    fn test_page_from_to() {
        let page = Page::new(vec!["a", "b", "c"], 53, Pagination::new(Some(2), 25));
        assert_eq!(page.from, 26);
        assert_eq!(page.to, 28);
        assert_eq!(page.last_page, 3);

        let empty: Page<&str> = Page::new(vec![], 0, Pagination::new(Some(1), 25));
        assert_eq!((empty.from, empty.to), (0, 0));
        assert_eq!(empty.last_page, 1);
    }

    #[test]
    fn test_page_map_keeps_numbers() {
        let page = Page::new(vec![1, 2], 2, Pagination::new(None, 10)).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.total, 2);
        assert_eq!(page.to, 2);
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("1, 2,x,,3,2,-4,0"), vec![1, 2, 3]);
        assert!(parse_id_list("").is_empty());
    }

    #[test]
    fn test_bulk_selection() {
        assert_eq!(
            BulkSelection::from_request(true, "1,2"),
            BulkSelection::AllMatching
        );
        assert_eq!(
            BulkSelection::from_request(false, "4,5"),
            BulkSelection::Ids(vec![4, 5])
        );
        assert!(BulkSelection::from_request(false, "").is_empty());
        assert!(!BulkSelection::AllMatching.is_empty());
    }
}
