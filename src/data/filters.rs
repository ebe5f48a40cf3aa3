/// Paging and ordering for list queries.
///
/// `sort` names a column, optionally prefixed with `-` for descending order.
/// It must appear in `sort_safelist` before it is spliced into SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    pub sort_safelist: Vec<String>,
}

impl Filters {
    pub const DEFAULT_PAGE_SIZE: i64 = 20;

    /// First page, default page size, ascending by `default_sort`.
    pub fn new(default_sort: &str, safelist: &[&str]) -> Self {
        Self {
            page: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
            sort: default_sort.to_string(),
            sort_safelist: safelist.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn sort_is_safe(&self) -> bool {
        self.sort_safelist.iter().any(|safe| *safe == self.sort)
    }

    /// Column to order by. Falls back to `id` for a value outside the safelist.
    pub fn sort_column(&self) -> &str {
        if self.sort_is_safe() {
            self.sort.trim_start_matches('-')
        } else {
            "id"
        }
    }

    pub fn sort_direction(&self) -> &'static str {
        if self.sort.starts_with('-') {
            "DESC"
        } else {
            "ASC"
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.page_size)
    }
}
