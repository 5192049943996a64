mod validation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use validation::{FieldViolation, InquiryFields, ValidInquiry};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A stored lead. `id` and `created_at` are fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Inquiry {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub location: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Inquiry {
    /// Case-insensitive substring match across the four text fields.
    pub fn matches(&self, needle_lower: &str) -> bool {
        [&self.name, &self.email, &self.location, &self.message]
            .iter()
            .any(|value| value.to_lowercase().contains(needle_lower))
    }

    pub(crate) fn apply(&mut self, fields: &ValidInquiry) {
        self.name = fields.name().to_string();
        self.email = fields.email().to_string();
        self.location = fields.location().to_string();
        self.message = fields.message().to_string();
    }
}

/// Offset pagination plus an optional free-text filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    page: u32,
    page_size: u32,
    search: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            search: None,
        }
    }
}

impl ListQuery {
    /// Zero page values fall back to the defaults, page size is capped at
    /// [`MAX_PAGE_SIZE`], and a blank search means "no filter".
    pub fn new(page: u32, page_size: u32, search: Option<&str>) -> Self {
        let page = if page == 0 { DEFAULT_PAGE } else { page };
        let page_size = match page_size {
            0 => DEFAULT_PAGE_SIZE,
            size => size.min(MAX_PAGE_SIZE),
        };
        let search = search
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Self {
            page,
            page_size,
            search,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

/// One page of inquiries and the size of the full filtered result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryPage {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub inquiries: Vec<Inquiry>,
}
