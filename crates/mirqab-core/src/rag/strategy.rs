//! Retrieval strategy selection.
//!
//! The free-text branching is expressed as an explicit strategy enum so
//! each rule, and the ambiguity resolution between them, is testable in
//! isolation. The fallback-on-empty-result behavior (`Keyword` to
//! `RecentFallback`) is an explicit transition taken by the pipeline, not
//! part of classification.

use chrono::{DateTime, Utc};

use super::device::extract_device_filter;
use super::keywords::expand_keywords;
use super::time_window::extract_time_window;

/// How the report store will be queried for one question.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalStrategy {
    /// Explicit time constraint found in the query.
    TimeFiltered {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Broad question ("show me all detections"); recent reports in the
    /// store's natural recency order.
    General,
    /// Specific question; substring search with the expanded keywords.
    Keyword(String),
    /// Nothing usable extracted; same retrieval as `General`.
    RecentFallback,
}

/// Queries matching any of these are answered from recent reports rather
/// than a keyword search.
const GENERAL_INTENT: &[&str] = &[
    "all",
    "total",
    "count",
    "how many",
    "last report",
    "latest",
    "recent",
    "show me",
    "list",
    "summary",
    "overview",
    "any detections",
    "what detections",
    "show all",
    "give me all",
];

fn is_general_query(query: &str) -> bool {
    let q = query.to_lowercase();
    GENERAL_INTENT.iter().any(|kw| q.contains(kw))
        || query.split_whitespace().count() <= 3
}

/// A classified query: the chosen strategy plus the device filter, which
/// composes with any strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedQuery {
    pub strategy: RetrievalStrategy,
    pub device_id: Option<String>,
}

/// Decide the retrieval strategy for a query, in priority order:
/// time filter, general intent (or very short query), keyword search,
/// recent fallback.
pub fn classify(query: &str, now: DateTime<Utc>) -> ClassifiedQuery {
    let device_id = extract_device_filter(query);

    if let Some(window) = extract_time_window(query, now) {
        return ClassifiedQuery {
            strategy: RetrievalStrategy::TimeFiltered {
                start: window.start,
                end: window.end,
            },
            device_id,
        };
    }

    if is_general_query(query) {
        return ClassifiedQuery {
            strategy: RetrievalStrategy::General,
            device_id,
        };
    }

    let keywords = expand_keywords(query);
    if keywords.trim().len() > 2 {
        return ClassifiedQuery {
            strategy: RetrievalStrategy::Keyword(keywords),
            device_id,
        };
    }

    ClassifiedQuery {
        strategy: RetrievalStrategy::RecentFallback,
        device_id,
    }
}
