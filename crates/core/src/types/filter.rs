//! Store order list filters.
//!
//! Filters travel two ways: as request parameters for `GET /store/orders`, and
//! as a compact query string that restores the same view later. The compact
//! form leaves out every value that equals its default.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use thiserror::Error;
use url::form_urlencoded;

use super::status::{OrderStatus, StatusParseError};

/// Page size requested from the backend. The board shows every matching order.
pub const PER_PAGE: u32 = 1000;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors from parsing a filter query string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterParseError {
    #[error(transparent)]
    Status(#[from] StatusParseError),

    #[error("invalid {field} '{value}', expected YYYY-MM-DD")]
    Date { field: &'static str, value: String },

    #[error("unknown sort order: {0}")]
    Sort(String),
}

/// Sort order of the store order list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderSort {
    #[default]
    Newest,
    Oldest,
    PriceHigh,
    PriceLow,
}

impl OrderSort {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::PriceHigh => "price_high",
            Self::PriceLow => "price_low",
        }
    }
}

impl fmt::Display for OrderSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSort {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "price_high" => Ok(Self::PriceHigh),
            "price_low" => Ok(Self::PriceLow),
            other => Err(FilterParseError::Sort(other.to_string())),
        }
    }
}

/// The filter set sent with every order fetch.
///
/// An empty status set means "every status".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFilters {
    pub statuses: BTreeSet<OrderStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    search: Option<String>,
    pub sort: OrderSort,
}

impl Default for OrderFilters {
    fn default() -> Self {
        Self {
            statuses: default_statuses(),
            start_date: None,
            end_date: None,
            search: None,
            sort: OrderSort::default(),
        }
    }
}

fn default_statuses() -> BTreeSet<OrderStatus> {
    BTreeSet::from([OrderStatus::Pending, OrderStatus::Ready])
}

fn join_statuses(statuses: &BTreeSet<OrderStatus>) -> String {
    statuses
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

impl OrderFilters {
    /// Free-text search, trimmed. `None` when blank.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Set the free-text search. Blank input clears it.
    pub fn set_search(&mut self, query: &str) {
        let trimmed = query.trim();
        self.search = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    /// Builder form of [`Self::set_search`].
    #[must_use]
    pub fn with_search(mut self, query: &str) -> Self {
        self.set_search(query);
        self
    }

    /// Request parameters for `GET /store/orders`.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(6);
        if !self.statuses.is_empty() {
            pairs.push(("status", join_statuses(&self.statuses)));
        }
        if let Some(date) = self.start_date {
            pairs.push(("start_date", date.format(DATE_FORMAT).to_string()));
        }
        if let Some(date) = self.end_date {
            pairs.push(("end_date", date.format(DATE_FORMAT).to_string()));
        }
        if let Some(q) = &self.search {
            pairs.push(("q", q.clone()));
        }
        pairs.push(("sort", self.sort.as_str().to_string()));
        pairs.push(("per_page", PER_PAGE.to_string()));
        pairs
    }

    /// Compact query string that restores this view. Defaults are left out.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        if self.statuses != default_statuses() {
            out.append_pair("status", &join_statuses(&self.statuses));
        }
        if let Some(date) = self.start_date {
            out.append_pair("start_date", &date.format(DATE_FORMAT).to_string());
        }
        if let Some(date) = self.end_date {
            out.append_pair("end_date", &date.format(DATE_FORMAT).to_string());
        }
        if let Some(q) = &self.search {
            out.append_pair("q", q);
        }
        if self.sort != OrderSort::default() {
            out.append_pair("sort", self.sort.as_str());
        }
        out.finish()
    }

    /// Parse a query string produced by [`Self::to_query_string`].
    ///
    /// Missing keys take their defaults; unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`FilterParseError`] for an unknown status or sort, or a
    /// malformed date.
    pub fn from_query_string(query: &str) -> Result<Self, FilterParseError> {
        let mut filters = Self::default();
        let query = query.strip_prefix('?').unwrap_or(query);

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "status" => {
                    filters.statuses = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::parse)
                        .collect::<Result<_, _>>()?;
                }
                "start_date" => filters.start_date = parse_date("start_date", &value)?,
                "end_date" => filters.end_date = parse_date("end_date", &value)?,
                "q" => filters.set_search(&value),
                "sort" => filters.sort = value.parse()?,
                _ => {}
            }
        }

        Ok(filters)
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<Option<NaiveDate>, FilterParseError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(Some)
        .map_err(|_| FilterParseError::Date {
            field,
            value: value.to_string(),
        })
}
