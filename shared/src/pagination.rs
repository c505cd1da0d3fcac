use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

/// `ceil(total / size)`，size 为 0 时按 1 计
pub fn total_pages(total: usize, size: usize) -> usize {
    total.div_ceil(size.max(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default = "first_page")]
    pub page: usize,
    #[serde(alias = "page_size", default = "default_size")]
    pub page_size: usize,
}

fn first_page() -> usize {
    1
}

fn default_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self { page, page_size }.normalized()
    }

    /// 页码从 1 开始，页大小限制在 `1..=MAX_PAGE_SIZE`
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    #[serde(alias = "page_size")]
    pub page_size: usize,
    #[serde(alias = "total_items")]
    pub total_items: usize,
    #[serde(alias = "total_pages")]
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

/// 从 `items` 取一页，超出末尾返回空页
pub fn paginate<T: Clone>(items: &[T], request: PageRequest) -> Page<T> {
    let request = request.normalized();
    let start = (request.page - 1).saturating_mul(request.page_size);
    let slice = items
        .iter()
        .skip(start)
        .take(request.page_size)
        .cloned()
        .collect();

    Page {
        items: slice,
        page: request.page,
        page_size: request.page_size,
        total_items: items.len(),
        total_pages: total_pages(items.len(), request.page_size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(5, 0), 5);
    }

    #[test]
    fn pages_reconstruct_the_list() {
        for len in [0usize, 1, 9, 10, 11, 37] {
            let items: Vec<usize> = (0..len).collect();
            for size in [1usize, 3, 10, 50] {
                let pages = total_pages(len, size);
                let mut rebuilt = Vec::new();
                for p in 1..=pages {
                    let page = paginate(&items, PageRequest::new(p, size));
                    assert!(!page.items.is_empty());
                    rebuilt.extend(page.items);
                }
                assert_eq!(rebuilt, items, "len={} size={}", len, size);
            }
        }
    }

    #[test]
    fn out_of_range_page_is_empty() {
        let items = vec!['a', 'b', 'c'];
        let page = paginate(&items, PageRequest::new(5, 2));
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 2);
        assert!(!page.has_next());
    }

    #[test]
    fn request_is_normalized() {
        let req = PageRequest::new(0, 10_000);
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, MAX_PAGE_SIZE);
        let parsed: PageRequest = serde_json::from_str(r#"{"page_size": 25}"#).unwrap();
        assert_eq!(parsed, PageRequest { page: 1, page_size: 25 });
    }
}
