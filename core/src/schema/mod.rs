// homebites/src/schema/mod.rs

//! The Schema Registry: the fixed HomeBites collections and the fields each
//! one may be queried on.
//!
//! The registry seeds the translator's prompt and backs the gate's
//! unknown-collection / unknown-field check (see [`validate`]).

pub mod validate;

use serde::Serialize;
use std::fmt;

pub use validate::SchemaViolation;

/// The implicit identifier every collection carries.
pub const ID_FIELD: &str = "_id";

/// Semantic type of a schema field, used to describe the schema to the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "of", rename_all = "snake_case")]
pub enum FieldKind {
  Text,
  Integer,
  Decimal,
  /// Closed set of string values.
  OneOf(&'static [&'static str]),
  /// Open set of string values (new statuses may appear).
  Status,
  /// Foreign key to the `_id` of another collection.
  Reference(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDef {
  pub name: &'static str,
  pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionDef {
  pub name: &'static str,
  pub entity: &'static str,
  pub fields: Vec<FieldDef>,
}

impl CollectionDef {
  /// Field names in declaration order, without `_id`.
  pub fn field_names(&self) -> Vec<&'static str> {
    self.fields.iter().map(|f| f.name).collect()
  }

  /// `true` for declared fields and for `_id`.
  pub fn has_field(&self, field: &str) -> bool {
    field == ID_FIELD || self.fields.iter().any(|f| f.name == field)
  }
}

/// Authoritative, read-only description of the HomeBites database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaRegistry {
  collections: Vec<CollectionDef>,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldDef {
  FieldDef { name, kind }
}

impl SchemaRegistry {
  /// The four HomeBites collections. Chefs and customers share `users`.
  pub fn homebites() -> Self {
    Self {
      collections: vec![
        CollectionDef {
          name: "users",
          entity: "User",
          fields: vec![
            field("role", FieldKind::OneOf(&["chef", "customer"])),
            field("name", FieldKind::Text),
            field("email", FieldKind::Text),
          ],
        },
        CollectionDef {
          name: "orders",
          entity: "Order",
          fields: vec![
            field("chefId", FieldKind::Reference("users")),
            field("customerId", FieldKind::Reference("users")),
            field("status", FieldKind::Status),
          ],
        },
        CollectionDef {
          name: "meals",
          entity: "Meal",
          fields: vec![
            field("name", FieldKind::Text),
            field("chefId", FieldKind::Reference("users")),
            field("quantity", FieldKind::Integer),
            field("cuisine", FieldKind::Text),
            field("price", FieldKind::Decimal),
            field("category", FieldKind::Text),
            field("description", FieldKind::Text),
          ],
        },
        CollectionDef {
          name: "carts",
          entity: "Cart",
          fields: vec![
            field("customerId", FieldKind::Reference("users")),
            field("mealId", FieldKind::Reference("meals")),
          ],
        },
      ],
    }
  }

  pub fn collections(&self) -> &[CollectionDef] {
    &self.collections
  }

  pub fn collection(&self, name: &str) -> Option<&CollectionDef> {
    self.collections.iter().find(|c| c.name == name)
  }

  /// Declared field names of `collection`, or `None` for an unknown collection.
  pub fn fields(&self, collection: &str) -> Option<Vec<&'static str>> {
    self.collection(collection).map(CollectionDef::field_names)
  }

  pub fn has_field(&self, collection: &str, field: &str) -> bool {
    self.collection(collection).map_or(false, |c| c.has_field(field))
  }

  /// Natural-language schema description embedded in the translator prompt.
  pub fn describe_for_prompt(&self) -> String {
    let mut out = String::from("Collections:\n");
    for (idx, c) in self.collections.iter().enumerate() {
      let described: Vec<String> = c.fields.iter().map(describe_field).collect();
      out.push_str(&format!("    {}) {}: {}\n", idx + 1, c.name, described.join(", ")));
    }

    let allowed: Vec<String> = self
      .collections
      .iter()
      .map(|c| {
        let quoted: Vec<String> = c.fields.iter().map(|f| format!("\"{}\"", f.name)).collect();
        format!("{}({})", c.name, quoted.join(","))
      })
      .collect();
    out.push_str(&format!(
      "Only use the following collections and their fields: {}. Every collection also has \"_id\". \
       Do not query any other collection or use any other fields.\n",
      allowed.join(", ")
    ));
    out
  }
}

fn describe_field(f: &FieldDef) -> String {
  match f.kind {
    FieldKind::Reference(target) => format!("{} (the _id of a document in {})", f.name, target),
    FieldKind::OneOf(values) => format!("{} (one of: {})", f.name, values.join(", ")),
    _ => f.name.to_string(),
  }
}

impl fmt::Display for SchemaRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for c in &self.collections {
      writeln!(f, "{}: {}", c.name, c.field_names().join(", "))?;
    }
    Ok(())
  }
}

impl Default for SchemaRegistry {
  fn default() -> Self {
    Self::homebites()
  }
}
