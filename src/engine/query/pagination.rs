/// Offset/limit window derived from 1-based `page` and `pageSize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    /// Both values must be positive; otherwise no pagination applies.
    /// `max_page_size` caps the limit when set.
    pub fn from_request(
        page: Option<i64>,
        page_size: Option<i64>,
        max_page_size: Option<usize>,
    ) -> Option<Page> {
        let (page, page_size) = match (page, page_size) {
            (Some(p), Some(s)) if p > 0 && s > 0 => (p as usize, s as usize),
            _ => return None,
        };
        let limit = max_page_size.map_or(page_size, |max| page_size.min(max));
        Some(Page {
            offset: (page - 1).saturating_mul(limit),
            limit,
        })
    }
}
