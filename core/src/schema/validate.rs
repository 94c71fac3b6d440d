// homebites/src/schema/validate.rs

//! Checks that a parsed read query only names collections and fields the
//! registry knows about.
//!
//! Field references are checked on their first path segment, so
//! `"chef.name"` is valid once a `$lookup` has added `chef` to the scope.
//! Aggregation stages that reshape documents (`$group`, `$project`, ...)
//! update the set of names later stages may use.

use super::{SchemaRegistry, ID_FIELD};
use crate::query::{ParsedQuery, ReadOperation};
use bson::{Bson, Document};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
  #[error("unknown collection '{0}'")]
  UnknownCollection(String),

  #[error("unknown field '{field}' for collection '{collection}'")]
  UnknownField { collection: String, field: String },

  #[error("unsupported aggregation stage '{0}'")]
  UnsupportedStage(String),

  #[error("malformed aggregation stage '{0}'")]
  MalformedStage(String),

  #[error("operator '{0}' expects an array of filter documents")]
  MalformedOperator(String),
}

/// Names visible at some point of a query, plus the collection they came from
/// (for error reporting).
#[derive(Debug, Clone)]
struct FieldScope {
  collection: String,
  names: HashSet<String>,
  /// Set after `$replaceRoot`: document shape is no longer known.
  open: bool,
}

impl FieldScope {
  fn for_collection(registry: &SchemaRegistry, collection: &str) -> Result<Self, SchemaViolation> {
    let def = registry
      .collection(collection)
      .ok_or_else(|| SchemaViolation::UnknownCollection(collection.to_string()))?;
    let mut names: HashSet<String> = def.fields.iter().map(|f| f.name.to_string()).collect();
    names.insert(ID_FIELD.to_string());
    Ok(Self {
      collection: collection.to_string(),
      names,
      open: false,
    })
  }

  fn reshaped<I: IntoIterator<Item = String>>(&self, names: I) -> Self {
    Self {
      collection: self.collection.clone(),
      names: names.into_iter().collect(),
      open: false,
    }
  }

  fn check(&self, path: &str) -> Result<(), SchemaViolation> {
    if self.open {
      return Ok(());
    }
    let head = path.split('.').next().unwrap_or(path);
    if self.names.contains(head) {
      Ok(())
    } else {
      Err(SchemaViolation::UnknownField {
        collection: self.collection.clone(),
        field: path.to_string(),
      })
    }
  }

  fn add(&mut self, path: &str) {
    let head = path.split('.').next().unwrap_or(path);
    self.names.insert(head.to_string());
  }
}

/// Validates every collection and field reference in `query`.
pub fn validate(registry: &SchemaRegistry, query: &ParsedQuery) -> Result<(), SchemaViolation> {
  let scope = FieldScope::for_collection(registry, &query.collection)?;
  match &query.operation {
    ReadOperation::Find { filter, options } => {
      check_filter(&scope, filter)?;
      if let Some(projection) = &options.projection {
        check_keys(&scope, projection)?;
      }
      if let Some(sort) = &options.sort {
        check_keys(&scope, sort)?;
      }
      Ok(())
    }
    ReadOperation::FindOne { filter, projection } => {
      check_filter(&scope, filter)?;
      if let Some(projection) = projection {
        check_keys(&scope, projection)?;
      }
      Ok(())
    }
    ReadOperation::CountDocuments { filter } => check_filter(&scope, filter),
    ReadOperation::EstimatedDocumentCount => Ok(()),
    ReadOperation::Distinct { field, filter } => {
      scope.check(field)?;
      check_filter(&scope, filter)
    }
    ReadOperation::Aggregate { pipeline } => check_pipeline(registry, scope, pipeline).map(|_| ()),
  }
}

fn check_keys(scope: &FieldScope, doc: &Document) -> Result<(), SchemaViolation> {
  doc.keys().try_for_each(|key| scope.check(key))
}

fn check_filter(scope: &FieldScope, filter: &Document) -> Result<(), SchemaViolation> {
  for (key, value) in filter {
    match key.as_str() {
      "$and" | "$or" | "$nor" => {
        let clauses = match value {
          Bson::Array(clauses) => clauses,
          _ => return Err(SchemaViolation::MalformedOperator(key.clone())),
        };
        for clause in clauses {
          match clause {
            Bson::Document(sub) => check_filter(scope, sub)?,
            _ => return Err(SchemaViolation::MalformedOperator(key.clone())),
          }
        }
      }
      "$expr" => check_expression(scope, value)?,
      // $text, $comment and similar top-level operators name no fields.
      k if k.starts_with('$') => {}
      field => scope.check(field)?,
    }
  }
  Ok(())
}

/// Walks an aggregation expression; `"$field"` strings are field paths.
fn check_expression(scope: &FieldScope, expr: &Bson) -> Result<(), SchemaViolation> {
  match expr {
    Bson::String(s) if s.starts_with('$') && !s.starts_with("$$") => scope.check(&s[1..]),
    Bson::Array(items) => items.iter().try_for_each(|item| check_expression(scope, item)),
    Bson::Document(doc) => doc.values().try_for_each(|value| check_expression(scope, value)),
    _ => Ok(()),
  }
}

fn check_pipeline(
  registry: &SchemaRegistry,
  mut scope: FieldScope,
  pipeline: &[Document],
) -> Result<FieldScope, SchemaViolation> {
  for stage in pipeline {
    let (name, body) = stage
      .iter()
      .next()
      .ok_or_else(|| SchemaViolation::MalformedStage("<empty>".to_string()))?;
    if stage.len() != 1 {
      return Err(SchemaViolation::MalformedStage(name.clone()));
    }
    scope = check_stage(registry, scope, name, body)?;
  }
  Ok(scope)
}

fn stage_document<'a>(name: &str, body: &'a Bson) -> Result<&'a Document, SchemaViolation> {
  match body {
    Bson::Document(doc) => Ok(doc),
    _ => Err(SchemaViolation::MalformedStage(name.to_string())),
  }
}

fn check_stage(
  registry: &SchemaRegistry,
  mut scope: FieldScope,
  name: &str,
  body: &Bson,
) -> Result<FieldScope, SchemaViolation> {
  match name {
    "$match" => {
      check_filter(&scope, stage_document(name, body)?)?;
      Ok(scope)
    }
    "$lookup" => {
      let spec = stage_document(name, body)?;
      let from = spec
        .get_str("from")
        .map_err(|_| SchemaViolation::MalformedStage(name.to_string()))?;
      let foreign = FieldScope::for_collection(registry, from)?;
      if let Ok(local_field) = spec.get_str("localField") {
        scope.check(local_field)?;
      }
      if let Ok(foreign_field) = spec.get_str("foreignField") {
        foreign.check(foreign_field)?;
      }
      // `let` variables are expressions over the local documents.
      match spec.get("let") {
        None => {}
        Some(Bson::Document(vars)) => {
          for value in vars.values() {
            check_expression(&scope, value)?;
          }
        }
        Some(_) => return Err(SchemaViolation::MalformedStage(name.to_string())),
      }
      if let Ok(sub_pipeline) = spec.get_array("pipeline") {
        let stages = sub_pipeline
          .iter()
          .map(|s| match s {
            Bson::Document(d) => Ok(d.clone()),
            _ => Err(SchemaViolation::MalformedStage(name.to_string())),
          })
          .collect::<Result<Vec<_>, _>>()?;
        check_pipeline(registry, foreign, &stages)?;
      }
      let alias = spec
        .get_str("as")
        .map_err(|_| SchemaViolation::MalformedStage(name.to_string()))?;
      scope.add(alias);
      Ok(scope)
    }
    "$unwind" => {
      let path = match body {
        Bson::String(path) => path.as_str(),
        Bson::Document(doc) => doc
          .get_str("path")
          .map_err(|_| SchemaViolation::MalformedStage(name.to_string()))?,
        _ => return Err(SchemaViolation::MalformedStage(name.to_string())),
      };
      scope.check(path.trim_start_matches('$'))?;
      Ok(scope)
    }
    "$group" => {
      let spec = stage_document(name, body)?;
      for value in spec.values() {
        check_expression(&scope, value)?;
      }
      Ok(scope.reshaped(spec.keys().cloned()))
    }
    "$project" => {
      let spec = stage_document(name, body)?;
      let mut excluding = false;
      let mut kept: Vec<String> = vec![ID_FIELD.to_string()];
      for (key, value) in spec {
        match value {
          Bson::Int32(0) | Bson::Int64(0) | Bson::Boolean(false) => {
            scope.check(key)?;
            excluding = true;
          }
          Bson::Double(n) if *n == 0.0 => {
            scope.check(key)?;
            excluding = true;
          }
          Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Boolean(true) => {
            scope.check(key)?;
            kept.push(key.clone());
          }
          other => {
            check_expression(&scope, other)?;
            kept.push(key.clone());
          }
        }
      }
      // An exclusion projection keeps everything it did not name.
      if excluding && kept.len() == 1 {
        Ok(scope)
      } else {
        Ok(scope.reshaped(kept))
      }
    }
    "$addFields" | "$set" => {
      let spec = stage_document(name, body)?;
      for (key, value) in spec {
        check_expression(&scope, value)?;
        scope.add(key);
      }
      Ok(scope)
    }
    "$unset" => {
      match body {
        Bson::String(path) => scope.check(path)?,
        Bson::Array(paths) => {
          for path in paths {
            match path {
              Bson::String(p) => scope.check(p)?,
              _ => return Err(SchemaViolation::MalformedStage(name.to_string())),
            }
          }
        }
        _ => return Err(SchemaViolation::MalformedStage(name.to_string())),
      }
      Ok(scope)
    }
    "$count" => match body {
      Bson::String(out) => Ok(scope.reshaped([out.clone()])),
      _ => Err(SchemaViolation::MalformedStage(name.to_string())),
    },
    "$sort" => {
      check_keys(&scope, stage_document(name, body)?)?;
      Ok(scope)
    }
    "$limit" | "$skip" | "$sample" => Ok(scope),
    "$sortByCount" => {
      check_expression(&scope, body)?;
      Ok(scope.reshaped([ID_FIELD.to_string(), "count".to_string()]))
    }
    "$facet" => {
      let spec = stage_document(name, body)?;
      for (facet, sub_pipeline) in spec {
        let stages = match sub_pipeline {
          Bson::Array(stages) => stages
            .iter()
            .map(|s| match s {
              Bson::Document(d) => Ok(d.clone()),
              _ => Err(SchemaViolation::MalformedStage(facet.clone())),
            })
            .collect::<Result<Vec<_>, _>>()?,
          _ => return Err(SchemaViolation::MalformedStage(name.to_string())),
        };
        check_pipeline(registry, scope.clone(), &stages)?;
      }
      Ok(scope.reshaped(spec.keys().cloned()))
    }
    "$replaceRoot" | "$replaceWith" => {
      check_expression(&scope, body)?;
      let mut opened = scope;
      opened.open = true;
      Ok(opened)
    }
    other => Err(SchemaViolation::UnsupportedStage(other.to_string())),
  }
}
