use serde::{Deserialize, Serialize};

/// `?page=&limit=` window. Pages are 1-based.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

const MAX_PAGE_SIZE: u32 = 100;

impl PageQuery {
    /// `(limit, offset)` for SQL, falling back to `default_size`.
    pub fn window(&self, default_size: u32) -> (i64, i64) {
        let limit = self.limit.unwrap_or(default_size).clamp(1, MAX_PAGE_SIZE);
        let page = self.page.unwrap_or(1).max(1);
        (i64::from(limit), i64::from(page - 1) * i64::from(limit))
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub results: Vec<T>,
}
