//! Filter and pagination state of the task listing.

use shared::{
    domain::{PriorityFilter, StatusFilter},
    protocol::{Task, TaskListQuery, TaskListResponse},
};

pub const DEFAULT_PAGE_SIZE: u32 = 6;
const MAX_PAGE_SIZE: u32 = 100;

/// Search text, filters and page of the listing.
///
/// Any effective change to the search text, status or priority puts the
/// listing back on page 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    search_text: String,
    status: StatusFilter,
    priority: PriorityFilter,
    page: u32,
    limit: u32,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl QueryParams {
    pub fn new(limit: u32) -> Self {
        Self {
            search_text: String::new(),
            status: StatusFilter::All,
            priority: PriorityFilter::All,
            page: 1,
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn status(&self) -> StatusFilter {
        self.status
    }

    pub fn priority(&self) -> PriorityFilter {
        self.priority
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Returns whether anything changed.
    pub fn set_search_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.search_text == text {
            return false;
        }
        self.search_text = text;
        self.page = 1;
        true
    }

    pub fn set_status(&mut self, status: StatusFilter) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.page = 1;
        true
    }

    pub fn set_priority(&mut self, priority: PriorityFilter) -> bool {
        if self.priority == priority {
            return false;
        }
        self.priority = priority;
        self.page = 1;
        true
    }

    /// Moves to `page`, clamped to `1..=total_pages`.
    pub fn set_page(&mut self, page: u32, total_pages: u32) -> bool {
        let page = page.clamp(1, total_pages.max(1));
        if self.page == page {
            return false;
        }
        self.page = page;
        true
    }

    pub fn to_list_query(&self) -> TaskListQuery {
        TaskListQuery {
            page: self.page,
            search: self.search_text.clone(),
            status: self.status.as_query_value().to_string(),
            priority: self.priority.as_query_value().to_string(),
            limit: self.limit,
        }
    }
}

/// One page of listing results, replaced wholesale on every successful query.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPage {
    pub items: Vec<Task>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total: u64,
}

impl Default for TaskPage {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            current_page: 1,
            total_pages: 1,
            total: 0,
        }
    }
}

impl TaskPage {
    /// `requested_page` stands in when the backend omits the page number.
    pub fn from_response(response: TaskListResponse, requested_page: u32) -> Self {
        let current_page = if response.page == 0 {
            requested_page.max(1)
        } else {
            response.page
        };
        Self {
            items: response.tasks,
            current_page,
            total_pages: response.pages.max(1),
            total: response.total,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Page numbers for a pager strip.
    pub fn page_numbers(&self) -> impl Iterator<Item = u32> {
        1..=self.total_pages
    }

    /// Pager strip is only shown with more than one page.
    pub fn shows_pager(&self) -> bool {
        self.total_pages > 1
    }
}

#[cfg(test)]
#[path = "tests/query_tests.rs"]
mod tests;
