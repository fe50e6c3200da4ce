//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Supported languages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Spanish,
    English,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Spanish => "es",
            Language::English => "en",
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "en" => Language::English,
            _ => Language::Spanish,
        }
    }
}

/// Countries where training content is deployed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "country_code"))]
pub enum Country {
    #[default]
    #[serde(rename = "CO")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CO"))]
    Colombia,
    #[serde(rename = "PA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "PA"))]
    Panama,
    #[serde(rename = "PE")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "PE"))]
    Peru,
}

impl Country {
    pub fn code(&self) -> &'static str {
        match self {
            Country::Colombia => "CO",
            Country::Panama => "PA",
            Country::Peru => "PE",
        }
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl Pagination {
    /// Maximum page size accepted from clients
    pub const MAX_PER_PAGE: u32 = 100;

    /// Build pagination from optional query values, clamping to sane bounds
    pub fn from_query(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(20).clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, pagination: &Pagination, total_items: u64) -> Self {
        let per_page = u64::from(pagination.per_page.max(1));
        let total_pages = total_items.div_ceil(per_page) as u32;
        Self {
            data,
            pagination: PaginationMeta {
                page: pagination.page,
                per_page: pagination.per_page,
                total_items,
                total_pages,
            },
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_offset() {
        let p = Pagination::from_query(Some(3), Some(25));
        assert_eq!(p.offset(), 50);
        assert_eq!(p.limit(), 25);
    }

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination::from_query(Some(0), Some(1000));
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, Pagination::MAX_PER_PAGE);
    }

    #[test]
    fn test_paginated_response_pages() {
        let p = Pagination::from_query(Some(1), Some(20));
        let resp = PaginatedResponse::new(vec![1, 2, 3], &p, 41);
        assert_eq!(resp.pagination.total_pages, 3);

        let empty: PaginatedResponse<i32> = PaginatedResponse::new(vec![], &p, 0);
        assert_eq!(empty.pagination.total_pages, 0);
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::default(), Language::Spanish);
        assert_eq!(Language::from_code("en"), Language::English);
        assert_eq!(Language::from_code("xx"), Language::Spanish);
    }
}
