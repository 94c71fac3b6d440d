// homebites/src/query/mod.rs

//! Structured form of a read-only shell query.
//!
//! A candidate string goes through [`parser::parse_shell_call`] first, then
//! [`ParsedQuery::from_shell_call`] maps the method onto one of the read
//! operations. Every other method is refused here with
//! [`ShapeError::NotAllowed`]; there is no structured form for a write.

pub mod parser;

use bson::{Bson, Document};
use std::fmt;
use thiserror::Error;

pub use parser::{parse_shell_call, ParseError, ShellCall};

/// Cursor modifiers accepted on `find`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CursorOptions {
  pub projection: Option<Document>,
  pub sort: Option<Document>,
  pub skip: Option<u64>,
  pub limit: Option<i64>,
}

/// The read operations the executor knows how to run.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOperation {
  Find { filter: Document, options: CursorOptions },
  FindOne { filter: Document, projection: Option<Document> },
  CountDocuments { filter: Document },
  EstimatedDocumentCount,
  Aggregate { pipeline: Vec<Document> },
  Distinct { field: String, filter: Document },
}

impl ReadOperation {
  /// Shell spelling of the operation, for logs.
  pub fn method_name(&self) -> &'static str {
    match self {
      ReadOperation::Find { .. } => "find",
      ReadOperation::FindOne { .. } => "findOne",
      ReadOperation::CountDocuments { .. } => "countDocuments",
      ReadOperation::EstimatedDocumentCount => "estimatedDocumentCount",
      ReadOperation::Aggregate { .. } => "aggregate",
      ReadOperation::Distinct { .. } => "distinct",
    }
  }

  /// Every document embedded in the operation (filters, projections, stages).
  pub fn documents(&self) -> Vec<&Document> {
    match self {
      ReadOperation::Find { filter, options } => {
        let mut docs = vec![filter];
        docs.extend(options.projection.iter());
        docs.extend(options.sort.iter());
        docs
      }
      ReadOperation::FindOne { filter, projection } => {
        let mut docs = vec![filter];
        docs.extend(projection.iter());
        docs
      }
      ReadOperation::CountDocuments { filter } | ReadOperation::Distinct { filter, .. } => vec![filter],
      ReadOperation::EstimatedDocumentCount => Vec::new(),
      ReadOperation::Aggregate { pipeline } => pipeline.iter().collect(),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
  pub collection: String,
  pub operation: ReadOperation,
}

impl fmt::Display for ParsedQuery {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "db.{}.{}(...)", self.collection, self.operation.method_name())
  }
}

/// A well-formed call that is not a supported read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
  #[error("method '{method}' is not a permitted read operation")]
  NotAllowed { method: String },

  #[error("bad arguments: {0}")]
  BadArguments(String),
}

#[derive(Debug, Clone, Copy)]
enum ReadMethod {
  Find,
  FindOne,
  CountDocuments,
  EstimatedDocumentCount,
  Aggregate,
  Distinct,
}

impl ReadMethod {
  fn from_shell(method: &str) -> Option<Self> {
    match method {
      "find" => Some(Self::Find),
      "findOne" | "find_one" => Some(Self::FindOne),
      "countDocuments" | "count_documents" | "count" => Some(Self::CountDocuments),
      "estimatedDocumentCount" | "estimated_document_count" => Some(Self::EstimatedDocumentCount),
      "aggregate" => Some(Self::Aggregate),
      "distinct" => Some(Self::Distinct),
      _ => None,
    }
  }
}

fn optional_document(args: &[Bson], idx: usize, what: &str) -> Result<Option<Document>, ShapeError> {
  match args.get(idx) {
    None | Some(Bson::Null) => Ok(None),
    Some(Bson::Document(doc)) => Ok(Some(doc.clone())),
    Some(_) => Err(ShapeError::BadArguments(format!("{} must be an object", what))),
  }
}

fn filter_arg(args: &[Bson], idx: usize) -> Result<Document, ShapeError> {
  Ok(optional_document(args, idx, "filter")?.unwrap_or_default())
}

fn integer_arg(args: &[Bson], modifier: &str) -> Result<i64, ShapeError> {
  match args {
    [Bson::Int32(n)] => Ok(i64::from(*n)),
    [Bson::Int64(n)] => Ok(*n),
    [Bson::Double(n)] if n.fract() == 0.0 => Ok(*n as i64),
    _ => Err(ShapeError::BadArguments(format!("{}() expects one integer", modifier))),
  }
}

fn max_args(args: &[Bson], max: usize, method: &str) -> Result<(), ShapeError> {
  if args.len() > max {
    return Err(ShapeError::BadArguments(format!(
      "{}() takes at most {} argument(s), got {}",
      method,
      max,
      args.len()
    )));
  }
  Ok(())
}

impl ParsedQuery {
  /// Maps a parsed shell call onto a read operation.
  pub fn from_shell_call(call: ShellCall) -> Result<Self, ShapeError> {
    let method = ReadMethod::from_shell(&call.method).ok_or_else(|| ShapeError::NotAllowed {
      method: call.method.clone(),
    })?;
    let name = call.method.as_str();
    let args = call.args.as_slice();

    let mut operation = match method {
      ReadMethod::Find => {
        max_args(args, 2, name)?;
        ReadOperation::Find {
          filter: filter_arg(args, 0)?,
          options: CursorOptions {
            projection: optional_document(args, 1, "projection")?,
            ..Default::default()
          },
        }
      }
      ReadMethod::FindOne => {
        max_args(args, 2, name)?;
        ReadOperation::FindOne {
          filter: filter_arg(args, 0)?,
          projection: optional_document(args, 1, "projection")?,
        }
      }
      ReadMethod::CountDocuments => {
        max_args(args, 1, name)?;
        ReadOperation::CountDocuments { filter: filter_arg(args, 0)? }
      }
      ReadMethod::EstimatedDocumentCount => ReadOperation::EstimatedDocumentCount,
      ReadMethod::Aggregate => {
        // The shell also accepts stages as separate arguments.
        let stages: Vec<Bson> = match args {
          [Bson::Array(stages)] => stages.clone(),
          _ => args.to_vec(),
        };
        let pipeline = stages
          .into_iter()
          .map(|stage| match stage {
            Bson::Document(doc) => Ok(doc),
            _ => Err(ShapeError::BadArguments("aggregate() stages must be objects".to_string())),
          })
          .collect::<Result<Vec<_>, _>>()?;
        ReadOperation::Aggregate { pipeline }
      }
      ReadMethod::Distinct => {
        max_args(args, 2, name)?;
        let field = match args.first() {
          Some(Bson::String(field)) => field.clone(),
          _ => return Err(ShapeError::BadArguments("distinct() expects a field name".to_string())),
        };
        ReadOperation::Distinct {
          field,
          filter: filter_arg(args, 1)?,
        }
      }
    };

    for (modifier, modifier_args) in &call.modifiers {
      operation = apply_modifier(operation, modifier, modifier_args)?;
    }

    Ok(Self {
      collection: call.collection,
      operation,
    })
  }
}

fn apply_modifier(operation: ReadOperation, modifier: &str, args: &[Bson]) -> Result<ReadOperation, ShapeError> {
  match (operation, modifier) {
    (op, "toArray" | "pretty") => Ok(op),
    (ReadOperation::Find { filter, mut options }, _) => {
      match modifier {
        "sort" => options.sort = optional_document(args, 0, "sort")?,
        "projection" => options.projection = optional_document(args, 0, "projection")?,
        "limit" => options.limit = Some(integer_arg(args, modifier)?),
        "skip" => {
          let skip = integer_arg(args, modifier)?;
          options.skip =
            Some(u64::try_from(skip).map_err(|_| ShapeError::BadArguments("skip() must not be negative".to_string()))?);
        }
        "count" | "countDocuments" => return Ok(ReadOperation::CountDocuments { filter }),
        other => {
          return Err(ShapeError::NotAllowed {
            method: other.to_string(),
          })
        }
      }
      Ok(ReadOperation::Find { filter, options })
    }
    (_, other) => Err(ShapeError::NotAllowed {
      method: other.to_string(),
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use bson::doc;

  fn parse(text: &str) -> Result<ParsedQuery, ShapeError> {
    ParsedQuery::from_shell_call(parse_shell_call(text).expect("parses"))
  }

  #[test]
  fn cursor_modifiers_fold_into_find_options() {
    let parsed = parse("db.meals.find({cuisine: 'Italian'}).sort({price: 1}).limit(1)").unwrap();
    assert_eq!(
      parsed.operation,
      ReadOperation::Find {
        filter: doc! { "cuisine": "Italian" },
        options: CursorOptions {
          sort: Some(doc! { "price": 1 }),
          limit: Some(1),
          ..Default::default()
        }
      }
    );
  }

  #[test]
  fn find_count_becomes_count_documents() {
    let parsed = parse("db.users.find({role: 'chef'}).count()").unwrap();
    assert_eq!(
      parsed.operation,
      ReadOperation::CountDocuments {
        filter: doc! { "role": "chef" }
      }
    );
  }

  #[test]
  fn snake_case_methods_are_accepted() {
    let parsed = parse("db.orders.count_documents({status: 'delivered'})").unwrap();
    assert_eq!(parsed.operation.method_name(), "countDocuments");
  }

  #[test]
  fn write_methods_have_no_structured_form() {
    assert_eq!(
      parse("db.meals.insertOne({name: 'x'})"),
      Err(ShapeError::NotAllowed {
        method: "insertOne".to_string()
      })
    );
  }

  #[test]
  fn modifiers_on_non_cursor_results_are_refused() {
    assert!(matches!(
      parse("db.meals.countDocuments({}).limit(2)"),
      Err(ShapeError::NotAllowed { .. })
    ));
  }
}
