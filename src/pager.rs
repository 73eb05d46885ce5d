//! Windowed pagination over a list of entries

use crate::config::PagerSettings;
use anyhow::{Result, bail};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Pager {
    id: String,
    items: Vec<Value>,
    current_page: usize,
    items_per_page: usize,
    max_disp_pages: usize,
    total_pages: usize,
    start_page: usize,
    end_page: usize,
    start_index: usize,
    end_index: Option<usize>,
    pages: Vec<usize>,
    page_items: Vec<Value>,
}

impl Pager {
    pub fn new(id: impl Into<String>, items: Vec<Value>, items_per_page: usize, max_disp_pages: usize) -> Result<Self> {
        if items_per_page == 0 {
            bail!("Items per page must be at least 1");
        }
        if max_disp_pages == 0 {
            bail!("Displayed pages must be at least 1");
        }

        let mut pager = Self {
            id: id.into(),
            items: Vec::new(),
            current_page: 1,
            items_per_page,
            max_disp_pages,
            total_pages: 0,
            start_page: 1,
            end_page: 0,
            start_index: 0,
            end_index: None,
            pages: Vec::new(),
            page_items: Vec::new(),
        };
        pager.set_items(items);
        Ok(pager)
    }

    pub fn from_settings(id: impl Into<String>, items: Vec<Value>, settings: &PagerSettings) -> Result<Self> {
        Self::new(id, items, settings.per_page, settings.max_disp_pages)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn items_per_page(&self) -> usize {
        self.items_per_page
    }

    pub fn max_disp_pages(&self) -> usize {
        self.max_disp_pages
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn start_page(&self) -> usize {
        self.start_page
    }

    pub fn end_page(&self) -> usize {
        self.end_page
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Index of the last item on the current page, `None` when there are no items
    pub fn end_index(&self) -> Option<usize> {
        self.end_index
    }

    /// Visible page numbers
    pub fn pages(&self) -> &[usize] {
        &self.pages
    }

    pub fn page_items(&self) -> &[Value] {
        &self.page_items
    }

    /// Replace the items, staying on the current page when it still exists
    pub fn set_items(&mut self, items: Vec<Value>) {
        self.items = items;
        self.total_pages = self.items.len().div_ceil(self.items_per_page);

        let page = if (1..=self.total_pages).contains(&self.current_page) {
            self.current_page
        } else {
            1
        };
        self.reset(page);
    }

    /// Go to `page`; pages outside `1..=total_pages` are ignored. Returns whether the page
    /// was applied.
    pub fn set_page(&mut self, page: usize) -> bool {
        if page < 1 || page > self.total_pages {
            return false;
        }

        let (start_page, end_page) = self.window(page);
        self.current_page = page;
        self.start_page = start_page;
        self.end_page = end_page;
        self.pages = (start_page..=end_page).collect();

        self.start_index = (page - 1) * self.items_per_page;
        let end = (self.start_index + self.items_per_page).min(self.items.len());
        self.end_index = Some(end - 1);
        self.page_items = self.items[self.start_index..end].to_vec();
        true
    }

    pub fn set_per_page(&mut self, items_per_page: usize) -> Result<()> {
        if items_per_page == 0 {
            bail!("Items per page must be at least 1");
        }
        self.items_per_page = items_per_page;
        self.total_pages = self.items.len().div_ceil(items_per_page);
        self.reset(1);
        Ok(())
    }

    pub fn set_max_disp_pages(&mut self, max_disp_pages: usize) -> Result<()> {
        if max_disp_pages == 0 {
            bail!("Displayed pages must be at least 1");
        }
        self.max_disp_pages = max_disp_pages;
        self.reset(1);
        Ok(())
    }

    pub fn step_page(&mut self, delta: isize) -> bool {
        match self.current_page.checked_add_signed(delta) {
            Some(page) => self.set_page(page),
            None => false,
        }
    }

    pub fn inc_page(&mut self) -> bool {
        self.step_page(1)
    }

    pub fn dec_page(&mut self) -> bool {
        self.step_page(-1)
    }

    fn reset(&mut self, page: usize) {
        if self.total_pages == 0 {
            self.current_page = 1;
            self.start_page = 1;
            self.end_page = 0;
            self.start_index = 0;
            self.end_index = None;
            self.pages.clear();
            self.page_items.clear();
        } else {
            self.set_page(page);
        }
    }

    /// First and last visible page numbers around `page`
    fn window(&self, page: usize) -> (usize, usize) {
        let total = self.total_pages;
        let max = self.max_disp_pages;
        if total <= max {
            return (1, total);
        }

        let before = max / 2;
        let after = max - before - 1;
        if page <= before {
            (1, max)
        } else if page + after >= total {
            (total - max + 1, total)
        } else {
            (page - before, page + after)
        }
    }
}
