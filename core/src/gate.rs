// homebites/src/gate.rs

//! The Safety Gate: the only way to obtain an [`ApprovedQuery`].
//!
//! Checks run in a fixed order and the first failure wins:
//! 0. the translator's refusal sentence (the oracle declined a mutation)
//! 1. `db.` prefix, single line
//! 2. denylist of mutating tokens (case-sensitive substring)
//! 3. parse + read allowlist + forbidden operators
//! 4. schema validation

use crate::query::{parse_shell_call, ParsedQuery, ShapeError};
use crate::schema::{validate::validate, SchemaRegistry, SchemaViolation};
use crate::translator::DESTRUCTIVE_REFUSAL;
use bson::{Bson, Document};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{event, instrument, Level};

/// Mutating shell methods. Any occurrence in a candidate is a rejection,
/// wherever it appears.
pub const DENYLIST: &[&str] = &[
  "deleteOne",
  "deleteMany",
  "remove",
  "findOneAndDelete",
  "findByIdAndDelete",
  "findOneAndRemove",
  "findByIdAndRemove",
  "updateOne",
  "updateMany",
  "update",
  "replaceOne",
  "findOneAndUpdate",
  "findByIdAndUpdate",
  "findAndModify",
  "save",
  "drop",
  "dropCollection",
  "db.dropDatabase",
];

/// Operators that write (`$out`, `$merge`) or run server-side code.
pub const FORBIDDEN_OPERATORS: &[&str] = &["$out", "$merge", "$where", "$function", "$accumulator"];

const QUERY_PREFIX: &str = "db.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionKind {
  MalformedQuery,
  ForbiddenOperation,
  UnknownSchemaElement,
}

impl RejectionKind {
  pub fn code(&self) -> &'static str {
    match self {
      RejectionKind::MalformedQuery => "MALFORMED_QUERY",
      RejectionKind::ForbiddenOperation => "FORBIDDEN_OPERATION",
      RejectionKind::UnknownSchemaElement => "UNKNOWN_SCHEMA_ELEMENT",
    }
  }
}

impl fmt::Display for RejectionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.code())
  }
}

/// Why the gate refused a candidate.
///
/// `detail` is for logs and tests. It is never shown to the caller; see
/// [`Rejection::refusal`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct Rejection {
  pub kind: RejectionKind,
  pub detail: String,
}

impl Rejection {
  fn new(kind: RejectionKind, detail: impl Into<String>) -> Self {
    Self {
      kind,
      detail: detail.into(),
    }
  }

  /// The fixed user-facing sentence for this rejection category.
  pub fn refusal(&self) -> &'static str {
    match self.kind {
      RejectionKind::MalformedQuery => {
        "Sorry, I couldn't turn that question into a valid database query (MALFORMED_QUERY)."
      }
      RejectionKind::ForbiddenOperation => {
        "Dangerous operation detected (FORBIDDEN_OPERATION): mutating operation not allowed. Only read operations are allowed."
      }
      RejectionKind::UnknownSchemaElement => {
        "Sorry, that question refers to data the HomeBites database does not have (UNKNOWN_SCHEMA_ELEMENT)."
      }
    }
  }
}

/// A query that passed every gate check.
///
/// Fields are private and there is no public constructor, so the executor can
/// only ever receive what [`SafetyGate::authorize`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovedQuery {
  text: String,
  query: ParsedQuery,
}

impl ApprovedQuery {
  /// The candidate text as approved.
  pub fn text(&self) -> &str {
    &self.text
  }

  pub fn query(&self) -> &ParsedQuery {
    &self.query
  }
}

/// Stateless validator for oracle-generated query strings.
#[derive(Debug, Clone)]
pub struct SafetyGate {
  schema: Arc<SchemaRegistry>,
}

impl SafetyGate {
  pub fn new(schema: Arc<SchemaRegistry>) -> Self {
    Self { schema }
  }

  /// Approves `candidate` or says which check it failed.
  #[instrument(name = "SafetyGate::authorize", skip_all, fields(candidate_len = candidate.len()))]
  pub fn authorize(&self, candidate: &str) -> Result<ApprovedQuery, Rejection> {
    event!(Level::DEBUG, %candidate, "Authorizing candidate query.");
    match self.check(candidate) {
      Ok(query) => {
        event!(Level::DEBUG, query = %query, "Candidate approved.");
        Ok(ApprovedQuery {
          text: candidate.to_string(),
          query,
        })
      }
      Err(rejection) => {
        event!(Level::WARN, category = %rejection.kind, detail = %rejection.detail, "Candidate rejected.");
        Err(rejection)
      }
    }
  }

  fn check(&self, candidate: &str) -> Result<ParsedQuery, Rejection> {
    let text = candidate.trim();

    if is_destructive_refusal(text) {
      return Err(Rejection::new(
        RejectionKind::ForbiddenOperation,
        "oracle declined a mutating request",
      ));
    }

    if !text.starts_with(QUERY_PREFIX) {
      return Err(Rejection::new(
        RejectionKind::MalformedQuery,
        format!("query must start with '{}'", QUERY_PREFIX),
      ));
    }
    if text.lines().count() > 1 {
      return Err(Rejection::new(RejectionKind::MalformedQuery, "query spans more than one line"));
    }

    if let Some(token) = DENYLIST.iter().find(|token| text.contains(*token)) {
      return Err(Rejection::new(
        RejectionKind::ForbiddenOperation,
        format!("mutating operation not allowed ('{}')", token),
      ));
    }

    let call = parse_shell_call(text).map_err(|e| Rejection::new(RejectionKind::MalformedQuery, e.to_string()))?;
    let query = ParsedQuery::from_shell_call(call).map_err(|e| match e {
      ShapeError::NotAllowed { .. } => Rejection::new(RejectionKind::ForbiddenOperation, e.to_string()),
      ShapeError::BadArguments(_) => Rejection::new(RejectionKind::MalformedQuery, e.to_string()),
    })?;

    for doc in query.operation.documents() {
      if let Some(operator) = find_forbidden_operator(doc) {
        return Err(Rejection::new(
          RejectionKind::ForbiddenOperation,
          format!("operator '{}' is not allowed", operator),
        ));
      }
    }

    validate(&self.schema, &query).map_err(|violation| match violation {
      SchemaViolation::UnsupportedStage(_)
      | SchemaViolation::MalformedStage(_)
      | SchemaViolation::MalformedOperator(_) => {
        Rejection::new(RejectionKind::MalformedQuery, violation.to_string())
      }
      SchemaViolation::UnknownCollection(_) | SchemaViolation::UnknownField { .. } => {
        Rejection::new(RejectionKind::UnknownSchemaElement, violation.to_string())
      }
    })?;

    Ok(query)
  }
}

/// Oracles sometimes quote the sentence or drop its final period.
fn is_destructive_refusal(text: &str) -> bool {
  let unquoted = text.trim_matches(|c: char| c == '"' || c == '\'' || c == '`').trim();
  let sentence = DESTRUCTIVE_REFUSAL.trim_end_matches('.');
  unquoted.trim_end_matches('.').eq_ignore_ascii_case(sentence)
}

fn find_forbidden_operator(doc: &Document) -> Option<&'static str> {
  for (key, value) in doc {
    if let Some(op) = FORBIDDEN_OPERATORS.iter().find(|op| key == *op) {
      return Some(op);
    }
    if let Some(op) = find_forbidden_in_value(value) {
      return Some(op);
    }
  }
  None
}

fn find_forbidden_in_value(value: &Bson) -> Option<&'static str> {
  match value {
    Bson::Document(doc) => find_forbidden_operator(doc),
    Bson::Array(items) => items.iter().find_map(find_forbidden_in_value),
    _ => None,
  }
}
