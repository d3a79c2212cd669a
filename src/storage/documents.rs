//! Typed views over the three persisted JSON documents.
//!
//! Loading never fails on shape: whatever JSON comes back is coerced into
//! the typed record, dropping entries of the wrong type and defaulting
//! missing fields.

use std::collections::BTreeMap;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// A document kind with a fixed location in the store.
pub trait Document: Sized {
    const PATH: &'static str;

    /// Coerce any loaded JSON into this document, defaulting what is missing.
    fn from_value(value: Value) -> Self;

    fn to_value(&self) -> Result<Value>;
}

// ---------------------------------------------------------------------------
// Feed list
// ---------------------------------------------------------------------------

/// Ordered, duplicate-free list of feed URLs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedList(Vec<String>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Duplicate,
    Empty,
}

impl FeedList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn urls(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.0.iter().any(|u| u == url.trim())
    }

    pub fn add(&mut self, url: &str) -> AddOutcome {
        let url = url.trim();
        if url.is_empty() {
            return AddOutcome::Empty;
        }
        if self.contains(url) {
            return AddOutcome::Duplicate;
        }
        self.0.push(url.to_string());
        AddOutcome::Added
    }

    pub fn remove(&mut self, url: &str) -> bool {
        let url = url.trim();
        let before = self.0.len();
        self.0.retain(|u| u != url);
        self.0.len() != before
    }

    pub fn remove_at(&mut self, index: usize) -> Option<String> {
        (index < self.0.len()).then(|| self.0.remove(index))
    }
}

impl Document for FeedList {
    const PATH: &'static str = "data/feeds.json";

    fn from_value(value: Value) -> Self {
        let mut list = FeedList::new();
        if let Value::Array(items) = value {
            for url in items.iter().filter_map(Value::as_str) {
                list.add(url);
            }
        }
        list
    }

    fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

// ---------------------------------------------------------------------------
// News archive
// ---------------------------------------------------------------------------

/// Daily reports keyed by `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NewsArchive(BTreeMap<String, String>);

impl NewsArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Store `report` for `date`, replacing an earlier run on the same day.
    pub fn insert(&mut self, date: NaiveDate, report: String) -> Option<String> {
        self.0.insert(date_key(date), report)
    }

    pub fn get(&self, date: &str) -> Option<&str> {
        self.0.get(date).map(String::as_str)
    }

    /// Dates newest first.
    pub fn dates_desc(&self) -> Vec<&str> {
        self.0.keys().rev().map(String::as_str).collect()
    }

    pub fn latest(&self) -> Option<(&str, &str)> {
        self.0.iter().next_back().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Document for NewsArchive {
    const PATH: &'static str = "data/news_data.json";

    fn from_value(value: Value) -> Self {
        let mut archive = NewsArchive::new();
        if let Value::Object(map) = value {
            for (date, report) in map {
                if let Value::String(report) = report {
                    archive.0.insert(date, report);
                }
            }
        }
        archive
    }

    fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

// ---------------------------------------------------------------------------
// Visitor statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitorStats {
    #[serde(default, alias = "totalViews")]
    pub total_views: u64,
    #[serde(default, alias = "dailyVisitors")]
    pub daily_visitors: BTreeMap<String, u64>,
}

impl VisitorStats {
    /// Count one visit on `today`.
    pub fn record(&mut self, today: NaiveDate) {
        self.total_views += 1;
        *self.daily_visitors.entry(date_key(today)).or_insert(0) += 1;
    }

    pub fn visitors_on(&self, date: NaiveDate) -> u64 {
        self.daily_visitors.get(&date_key(date)).copied().unwrap_or(0)
    }

    /// Per-day counts in ascending date order. Keys that are not dates are
    /// skipped.
    pub fn daily_series(&self) -> Vec<(NaiveDate, u64)> {
        let mut series: Vec<(NaiveDate, u64)> = self
            .daily_visitors
            .iter()
            .filter_map(|(k, v)| NaiveDate::parse_from_str(k, DATE_FORMAT).ok().map(|d| (d, *v)))
            .collect();
        series.sort_by_key(|(d, _)| *d);
        series
    }
}

fn count(value: Option<&Value>) -> u64 {
    value.and_then(Value::as_u64).unwrap_or(0)
}

impl Document for VisitorStats {
    const PATH: &'static str = "data/stats.json";

    fn from_value(value: Value) -> Self {
        let Value::Object(map) = value else {
            return VisitorStats::default();
        };

        let total_views = count(map.get("total_views").or_else(|| map.get("totalViews")));
        let daily_visitors = map
            .get("daily_visitors")
            .or_else(|| map.get("dailyVisitors"))
            .and_then(Value::as_object)
            .map(|days| days.iter().map(|(k, v)| (k.clone(), count(Some(v)))).collect())
            .unwrap_or_default();

        VisitorStats { total_views, daily_visitors }
    }

    fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
