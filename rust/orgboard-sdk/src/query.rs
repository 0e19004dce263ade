//! Query parameters and result pages shared by every list-backed view.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_SORT_BY: &str = "id";

/// Which field a free-text search applies to. Field semantics are backend-defined.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchBy {
    #[default]
    All,
    Field(String),
}

impl SearchBy {
    pub fn field(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() || name == "all" {
            SearchBy::All
        } else {
            SearchBy::Field(name)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SearchBy::All => "all",
            SearchBy::Field(name) => name,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, SearchBy::All)
    }
}

impl fmt::Display for SearchBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(format!("unknown sort direction '{}'", other)),
        }
    }
}

/// Mutable query parameters of one list view.
///
/// Every setter except [`QueryState::set_page`] resets the page to 0, so a
/// filter or sort change never lands the user on a page that no longer exists.
/// Setters return whether anything changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    pub search: String,
    pub search_by: SearchBy,
    pub page: u32,
    pub page_size: u32,
    pub sort_by: String,
    pub sort_direction: SortDirection,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            search: String::new(),
            search_by: SearchBy::All,
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
            sort_by: DEFAULT_SORT_BY.to_string(),
            sort_direction: SortDirection::Desc,
        }
    }
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn with_search_by(mut self, search_by: SearchBy) -> Self {
        self.search_by = search_by;
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_sort(mut self, sort_by: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_by = sort_by.into();
        self.sort_direction = direction;
        self
    }

    pub fn set_search(&mut self, search: &str) -> bool {
        if self.search == search {
            return false;
        }
        self.search = search.to_string();
        self.page = 0;
        true
    }

    pub fn set_search_by(&mut self, search_by: SearchBy) -> bool {
        if self.search_by == search_by {
            return false;
        }
        self.search_by = search_by;
        self.page = 0;
        true
    }

    pub fn set_page(&mut self, page: u32) -> bool {
        if self.page == page {
            return false;
        }
        self.page = page;
        true
    }

    /// Returns `None` for a zero page size, which is rejected.
    pub fn set_page_size(&mut self, page_size: u32) -> Option<bool> {
        if page_size == 0 {
            return None;
        }
        if self.page_size == page_size {
            return Some(false);
        }
        self.page_size = page_size;
        self.page = 0;
        Some(true)
    }

    pub fn set_sort(&mut self, sort_by: &str, direction: SortDirection) -> bool {
        if self.sort_by == sort_by && self.sort_direction == direction {
            return false;
        }
        self.sort_by = sort_by.to_string();
        self.sort_direction = direction;
        self.page = 0;
        true
    }

    /// Header-click semantics: the same field flips direction, a new field starts ascending.
    pub fn toggle_sort(&mut self, sort_by: &str) {
        let direction = if self.sort_by == sort_by {
            self.sort_direction.toggled()
        } else {
            SortDirection::Asc
        };
        self.set_sort(sort_by, direction);
    }
}

/// One page of a remote collection, replaced wholesale on every successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPage<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub total_elements: u64,
}

impl<T> Default for ResultPage<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> ResultPage<T> {
    pub fn new(data: Vec<T>, total_elements: u64) -> Self {
        Self {
            data,
            total_elements,
        }
    }

    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            total_elements: 0,
        }
    }

    pub fn page_count(&self, page_size: u32) -> u64 {
        if page_size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(page_size as u64)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Enforces `data.len() <= page_size`; returns how many rows were dropped.
    pub fn truncate_to(&mut self, page_size: u32) -> usize {
        let limit = page_size as usize;
        let excess = self.data.len().saturating_sub(limit);
        self.data.truncate(limit);
        excess
    }
}
