use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::format::FileCategory;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: String,
    #[serde(rename = "type")]
    pub category: FileCategory,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    pub files: Vec<FileEntry>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

/// Raw `/list` query parameters, kept as strings so that unparseable values
/// fall back instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
    pub search: String,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize, search: impl Into<String>) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
            search: search.into().to_lowercase(),
        }
    }

    pub fn from_params(params: &ListParams, default_page_size: usize) -> Self {
        let page = params.page.as_deref().map(parse_or_one).unwrap_or(1);
        let page_size = params
            .page_size
            .as_deref()
            .map(parse_or_one)
            .unwrap_or(default_page_size);

        Self::new(page, page_size, params.search.clone().unwrap_or_default())
    }

    /// `(start, end)` slice bounds into a list of `total` items.
    pub fn bounds(&self, total: usize) -> (usize, usize) {
        let start = (self.page - 1).saturating_mul(self.page_size).min(total);
        let end = start.saturating_add(self.page_size).min(total);
        (start, end)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.search.is_empty() || name.to_lowercase().contains(&self.search)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE, "")
    }
}

fn parse_or_one(value: &str) -> usize {
    value
        .parse::<i64>()
        .ok()
        .and_then(|n| usize::try_from(n.max(1)).ok())
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub name: String,
    pub size: u64,
    pub category: FileCategory,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, page_size: Option<&str>, search: Option<&str>) -> ListParams {
        ListParams {
            page: page.map(str::to_string),
            page_size: page_size.map(str::to_string),
            search: search.map(str::to_string),
        }
    }

    #[test]
    fn test_defaults_when_absent() {
        let request = PageRequest::from_params(&ListParams::default(), DEFAULT_PAGE_SIZE);
        assert_eq!(request, PageRequest::new(1, 10, ""));
    }

    #[test]
    fn test_unparseable_values_become_one() {
        let request = PageRequest::from_params(&params(Some("abc"), Some("ten"), None), 10);
        assert_eq!(request.page, 1);
        assert_eq!(request.page_size, 1);
    }

    #[test]
    fn test_values_below_one_are_raised() {
        let request = PageRequest::from_params(&params(Some("0"), Some("-5"), None), 10);
        assert_eq!(request.page, 1);
        assert_eq!(request.page_size, 1);
    }

    #[test]
    fn test_search_is_lowercased() {
        let request = PageRequest::from_params(&params(None, None, Some("RePort")), 10);
        assert_eq!(request.search, "report");
        assert!(request.matches("Quarterly_REPORT.pdf"));
        assert!(!request.matches("notes.txt"));
    }

    #[test]
    fn test_bounds() {
        assert_eq!(PageRequest::new(1, 10, "").bounds(25), (0, 10));
        assert_eq!(PageRequest::new(3, 10, "").bounds(25), (20, 25));
        assert_eq!(PageRequest::new(10, 10, "").bounds(25), (25, 25));
        assert_eq!(PageRequest::new(usize::MAX, usize::MAX, "").bounds(25), (25, 25));
    }

    #[test]
    fn test_list_page_serializes_camel_case() {
        let page = ListPage {
            files: Vec::new(),
            total: 0,
            page: 1,
            page_size: 10,
        };
        let value = serde_json::to_value(page).unwrap();
        assert_eq!(value["pageSize"], 10);
        assert!(value["files"].as_array().unwrap().is_empty());
    }
}
