use serde::Serialize;

pub const MAX_PAGE_SIZE: u32 = 50;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// A clamped page request: `page_number >= 1`, `page_size` in `1..=50`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page_number: u32,
    page_size: u32,
}

impl PageRequest {
    /// Out-of-range values are capped, never rejected.
    pub fn new(page_number: u32, page_size: u32) -> Self {
        Self {
            page_number: page_number.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> usize {
        (self.page_number as usize - 1) * self.page_size as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// Page metadata; serialised into the `Pagination` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub current_page: u32,
    pub page_size: u32,
    pub total_count: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageResult,
}

pub fn paginate(page_number: u32, page_size: u32, total_count: usize) -> PageResult {
    page_result(PageRequest::new(page_number, page_size), total_count)
}

fn page_result(request: PageRequest, total_count: usize) -> PageResult {
    PageResult {
        current_page: request.page_number,
        page_size: request.page_size,
        total_count,
        total_pages: total_count.div_ceil(request.page_size as usize),
    }
}

/// Takes the window `[offset, offset + page_size)` of `items`. A page past
/// the end is empty but still carries valid metadata.
pub fn slice<T>(items: Vec<T>, request: PageRequest) -> Page<T> {
    let meta = page_result(request, items.len());
    let items = items
        .into_iter()
        .skip(request.offset())
        .take(request.page_size as usize)
        .collect();
    Page { items, meta }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_three_items_in_pages_of_ten() {
        let items: Vec<u32> = (0..23).collect();

        let first = slice(items.clone(), PageRequest::new(1, 10));
        assert_eq!(first.items, (0..10).collect::<Vec<_>>());
        assert_eq!(first.meta.total_pages, 3);
        assert_eq!(first.meta.total_count, 23);

        let last = slice(items.clone(), PageRequest::new(3, 10));
        assert_eq!(last.items, vec![20, 21, 22]);

        let beyond = slice(items, PageRequest::new(4, 10));
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.meta.total_pages, 3);
        assert_eq!(beyond.meta.current_page, 4);
    }

    #[test]
    fn sizes_are_capped_not_rejected() {
        let r = PageRequest::new(0, 500);
        assert_eq!(r.page_number(), 1);
        assert_eq!(r.page_size(), MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(2, 0).page_size(), 1);
        assert_eq!(paginate(1, 51, 120).page_size, 50);
        assert_eq!(paginate(1, 51, 120).total_pages, 3);
    }

    #[test]
    fn empty_total_has_no_pages() {
        let meta = paginate(5, 10, 0);
        assert_eq!(meta.total_pages, 0);
        let page = slice(Vec::<u8>::new(), PageRequest::new(5, 10));
        assert!(page.items.is_empty());
        assert_eq!(page.meta.total_pages, 0);
    }

    #[test]
    fn header_shape() {
        let json = serde_json::to_string(&paginate(2, 10, 23)).unwrap();
        assert_eq!(
            json,
            r#"{"currentPage":2,"pageSize":10,"totalCount":23,"totalPages":3}"#
        );
    }
}
