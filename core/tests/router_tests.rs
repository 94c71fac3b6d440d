// tests/router_tests.rs

use homebites::router::{classify, is_homebites_query, Topic, DATA_QUERY_CUES, PLATFORM_KEYWORDS};

#[test]
fn test_vocabularies_are_pinned() {
  assert_eq!(
    PLATFORM_KEYWORDS,
    &[
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
    ]
  );
  assert_eq!(DATA_QUERY_CUES.len(), 23);
  assert!(DATA_QUERY_CUES.contains(&"how many"));
  assert!(DATA_QUERY_CUES.contains(&"most expensive"));
}

#[test]
fn test_platform_questions_go_to_the_description() {
  assert_eq!(
    classify("What payment methods does HomeBites support?"),
    Topic::PlatformDescription
  );
  assert_eq!(classify("Does the chef dashboard have notifications?"), Topic::PlatformDescription);
}

#[test]
fn test_data_cues_win_over_platform_keywords() {
  assert_eq!(classify("How many meals does chef Alice have?"), Topic::DataQuery);
  assert_eq!(classify("List the orders of customer Bob"), Topic::DataQuery);
  assert_eq!(classify("Delete all orders for customer Bob"), Topic::DataQuery);
}

#[test]
fn test_unmatched_questions_lean_to_data_queries() {
  assert_eq!(classify("What's the weather in Paris?"), Topic::DataQuery);
  assert_eq!(classify(""), Topic::DataQuery);
}

#[test]
fn test_matching_is_case_insensitive() {
  assert!(is_homebites_query("Tell me about HOMEBITES"));
  assert!(!is_homebites_query("Tell me about the stock market"));
  assert_eq!(classify("HOW MANY users are there"), Topic::DataQuery);
}
