pub const DEFAULT_BOOKS_PER_SHELF: usize = 8;

/// A page of the shelf expressed as an offset/limit pair over the id-ordered
/// collection. Pages are 1-based; anything below 1 has no window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: usize,
    pub limit: usize,
}

impl PageWindow {
    pub fn new(page: i64, per_page: usize) -> Option<Self> {
        if page < 1 || per_page == 0 {
            return None;
        }

        let offset = usize::try_from(page - 1).ok()?.checked_mul(per_page)?;
        // Stores take signed 64-bit offsets.
        i64::try_from(offset.checked_add(per_page)?).ok()?;

        Some(Self {
            offset,
            limit: per_page,
        })
    }

    pub fn first(per_page: usize) -> Self {
        Self {
            offset: 0,
            limit: per_page,
        }
    }

    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset)
            .take(self.limit)
            .cloned()
            .collect()
    }
}

/// Parses the `page` query value the lenient way: absent or non-numeric means
/// the first page.
pub fn parse_page(raw: Option<&str>) -> i64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(1)
}

pub fn paginate<T: Clone>(items: &[T], page: i64, per_page: usize) -> Vec<T> {
    match PageWindow::new(page, per_page) {
        Some(window) => window.slice(items),
        None => Vec::new(),
    }
}
