/// A page cut from an already-ranked list.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

pub const MIN_PER_PAGE: usize = 10;
pub const MAX_PER_PAGE: usize = 100;

/// Clamp raw request values: page ≥ 1, per_page within 10..=100.
pub fn clamp_params(page: i64, per_page: i64) -> (usize, usize) {
    let page = page.max(1) as usize;
    let per_page = per_page.clamp(MIN_PER_PAGE as i64, MAX_PER_PAGE as i64) as usize;
    (page, per_page)
}

/// 1-indexed pagination. Pages past the end are empty, not errors.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let total = items.len();
    let total_pages = total.div_ceil(per_page);
    let start = (page - 1).saturating_mul(per_page);

    let items = items.into_iter().skip(start).take(per_page).collect();
    Page {
        items,
        total,
        page,
        per_page,
        total_pages,
    }
}
