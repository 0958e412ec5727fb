//! Favicon hook.
//!
//! The merge hands remote favicon payloads to a `FaviconServiceTrait`
//! implementation. Only remote URL nodes carrying icon bytes trigger calls.

use std::collections::HashMap;

/// Receives favicons of remote bookmarks.
pub trait FaviconServiceTrait {
    /// Registers the page so its favicon can be stored.
    fn associate_favicon(&mut self, page_url: &str, title: &str);
    fn merge_favicon(&mut self, page_url: &str, icon_url: Option<&str>, icon_bytes: &[u8]);
}

/// Ignores every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFaviconService;

impl FaviconServiceTrait for NoopFaviconService {
    fn associate_favicon(&mut self, _page_url: &str, _title: &str) {}
    fn merge_favicon(&mut self, _page_url: &str, _icon_url: Option<&str>, _icon_bytes: &[u8]) {}
}

/// A stored favicon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFavicon {
    pub icon_url: Option<String>,
    pub bytes: Vec<u8>,
}

/// Keeps favicons in memory, keyed by page URL.
#[derive(Debug, Default, Clone)]
pub struct InMemoryFaviconStore {
    pages: HashMap<String, String>,
    icons: HashMap<String, StoredFavicon>,
}

impl InMemoryFaviconStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Title the page was registered with.
    pub fn page_title(&self, page_url: &str) -> Option<&str> {
        self.pages.get(page_url).map(String::as_str)
    }

    pub fn favicon(&self, page_url: &str) -> Option<&StoredFavicon> {
        self.icons.get(page_url)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn favicon_count(&self) -> usize {
        self.icons.len()
    }
}

impl FaviconServiceTrait for InMemoryFaviconStore {
    fn associate_favicon(&mut self, page_url: &str, title: &str) {
        self.pages.insert(page_url.to_string(), title.to_string());
    }

    fn merge_favicon(&mut self, page_url: &str, icon_url: Option<&str>, icon_bytes: &[u8]) {
        self.icons.insert(
            page_url.to_string(),
            StoredFavicon {
                icon_url: icon_url.map(str::to_string),
                bytes: icon_bytes.to_vec(),
            },
        );
    }
}
