// Fixed-size page navigation over an immutable result list.

use std::sync::Arc;

/// A cursor over pages of `items`. Navigation past either end is a no-op.
#[derive(Debug, Clone)]
pub struct Paginator<T> {
    items: Arc<[T]>,
    page_size: usize,
    /// Zero-based.
    current: usize,
}

impl<T> Paginator<T> {
    /// A page size of 0 is treated as 1.
    pub fn new(items: impl Into<Arc<[T]>>, page_size: usize) -> Self {
        Self {
            items: items.into(),
            page_size: page_size.max(1),
            current: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// At least 1, even with no items.
    pub fn total_pages(&self) -> usize {
        self.items.len().div_ceil(self.page_size).max(1)
    }

    /// One-based page number for display.
    pub fn page_number(&self) -> usize {
        self.current + 1
    }

    /// Items on the current page.
    pub fn page(&self) -> &[T] {
        let start = (self.current * self.page_size).min(self.items.len());
        let end = (start + self.page_size).min(self.items.len());
        &self.items[start..end]
    }

    /// Global (zero-based) index of the first item on the current page.
    pub fn offset(&self) -> usize {
        self.current * self.page_size
    }

    pub fn first(&mut self) -> &mut Self {
        self.current = 0;
        self
    }

    pub fn previous(&mut self) -> &mut Self {
        self.current = self.current.saturating_sub(1);
        self
    }

    pub fn next(&mut self) -> &mut Self {
        if self.current + 1 < self.total_pages() {
            self.current += 1;
        }
        self
    }

    pub fn last(&mut self) -> &mut Self {
        self.current = self.total_pages() - 1;
        self
    }

    pub fn has_previous(&self) -> bool {
        self.current > 0
    }

    pub fn has_next(&self) -> bool {
        self.current + 1 < self.total_pages()
    }
}
