// homebites/src/router.rs

//! Keyword-based topic routing.
//!
//! A cheap classifier that decides whether a question is about the platform
//! itself (answered from the static description) or needs the database.

use serde::Serialize;

/// Words that mark a question as being about HomeBites at all.
pub const PLATFORM_KEYWORDS: &[&str] = &[
  "homebites",
  "meal",
  "chef",
  "customer",
  "order",
  "cart",
  "menu",
  "dashboard",
  "delivery",
  "homemade",
  "food",
  "kitchen",
  "profile",
  "notification",
  "review",
  "rating",
  "payment",
];

/// Phrases that mark a question as asking for stored data.
pub const DATA_QUERY_CUES: &[&str] = &[
  "how many",
  "number of",
  "count",
  "list",
  "show",
  "find",
  "which",
  "who",
  "total",
  "average",
  "price",
  "cheapest",
  "most expensive",
  "email",
  "status",
  "cuisine",
  "category",
  "quantity",
  "user",
  "delete",
  "update",
  "remove",
  "drop",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
  PlatformDescription,
  DataQuery,
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
  needles.iter().any(|needle| haystack.contains(needle))
}

/// `true` when the question mentions any platform keyword.
pub fn is_homebites_query(question: &str) -> bool {
  contains_any(&question.to_lowercase(), PLATFORM_KEYWORDS)
}

/// Data cues win over platform keywords; anything unmatched is a data query.
pub fn classify(question: &str) -> Topic {
  let lowered = question.to_lowercase();
  if contains_any(&lowered, DATA_QUERY_CUES) {
    Topic::DataQuery
  } else if contains_any(&lowered, PLATFORM_KEYWORDS) {
    Topic::PlatformDescription
  } else {
    Topic::DataQuery
  }
}
