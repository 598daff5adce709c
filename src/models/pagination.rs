//! Page requests and page metadata shared by list endpoints

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    config::ReservationsConfig,
    error::{AppError, AppResult},
};

/// Raw `?page=&limit=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number (default: 1)
    pub page: Option<i64>,
    /// Entries per page
    pub limit: Option<i64>,
}

/// Validated page request
///
/// Only constructible through [`PageRequest::new`] or
/// [`PageRequest::from_query`], so `page >= 1` and
/// `1 <= limit <= max_page_size` always hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    limit: i64,
}

impl PageRequest {
    pub fn new(page: i64, limit: i64, config: &ReservationsConfig) -> AppResult<Self> {
        if page < 1 {
            return Err(AppError::InvalidInput(
                "Page must be a positive integer".to_string(),
            ));
        }
        if limit < 1 || limit > config.max_page_size {
            return Err(AppError::InvalidInput(format!(
                "Limit must be between 1 and {}",
                config.max_page_size
            )));
        }

        Ok(Self { page, limit })
    }

    pub fn from_query(query: PageQuery, config: &ReservationsConfig) -> AppResult<Self> {
        Self::new(
            query.page.unwrap_or(1),
            query.limit.unwrap_or(config.default_page_size),
            config,
        )
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// One page of entities plus the unpaginated total
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Page metadata returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub per_page: i64,
    pub total: i64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: i64) -> Self {
        Self {
            current_page: request.page,
            total_pages: (total + request.limit - 1) / request.limit,
            per_page: request.limit,
            total,
        }
    }
}
