// homebites/src/translator.rs

//! The Query Translator: question in, one candidate query string out.
//!
//! The output is whatever the oracle said, trimmed. It is never repaired or
//! retried here; the gate decides whether it is usable.

use crate::oracle::{non_empty, Oracle, OracleError};
use crate::schema::SchemaRegistry;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// The sentence the oracle is told to produce for destructive requests.
pub const DESTRUCTIVE_REFUSAL: &str = "I cannot delete or update anything in the database.";

const RESOLUTION_RULES: &str = "\
Meals, orders and carts only store user ids (chefId, customerId), never names. \
When a question names a chef or customer, first resolve the name to the user's _id through the users collection. \
Never match a person's name directly against meals, orders or carts, and never invent fields such as chef_name or customerName. \
To resolve a name in a single statement, use an aggregate pipeline with $lookup \
(for example from \"users\", localField \"chefId\", foreignField \"_id\") and then $match on the joined user's name.";

const OUTPUT_RULES: &str = "\
Respond with exactly one MongoDB shell query on a single line, in the form db.<collection>.<method>(<arguments>). \
Only use read methods: find, findOne, countDocuments, estimatedDocumentCount, aggregate or distinct. \
Do not use placeholders. Do not wrap the query in code fences. Do not add any explanation or other text.";

const EXAMPLE: &str = "\
Example question: How many meals does chef Alice have?
Example query: db.meals.aggregate([{$lookup: {from: \"users\", localField: \"chefId\", foreignField: \"_id\", as: \"chef\"}}, {$unwind: \"$chef\"}, {$match: {\"chef.name\": \"Alice\", \"chef.role\": \"chef\"}}, {$count: \"meals\"}])";

#[derive(Clone)]
pub struct QueryTranslator {
  oracle: Arc<dyn Oracle>,
  schema: Arc<SchemaRegistry>,
}

impl QueryTranslator {
  pub fn new(oracle: Arc<dyn Oracle>, schema: Arc<SchemaRegistry>) -> Self {
    Self { oracle, schema }
  }

  /// The full instruction text sent to the oracle for `question`.
  pub fn prompt_for(&self, question: &str) -> String {
    format!(
      "You translate questions about the HomeBites food-delivery platform into MongoDB queries.\n\
       {schema}\n\
       {resolution}\n\
       Never create, insert, update, replace or delete anything. \
       If the question asks to delete, remove, drop, update or change data, respond exactly with: {refusal}\n\
       {output}\n\
       {example}\n\n\
       Question: {question}\n\
       Query:",
      schema = self.schema.describe_for_prompt(),
      resolution = RESOLUTION_RULES,
      refusal = DESTRUCTIVE_REFUSAL,
      output = OUTPUT_RULES,
      example = EXAMPLE,
      question = question.trim(),
    )
  }

  /// Asks the oracle for a candidate query.
  #[instrument(name = "QueryTranslator::translate", skip_all)]
  pub async fn translate(&self, question: &str) -> Result<String, OracleError> {
    let prompt = self.prompt_for(question);
    let candidate = non_empty(self.oracle.complete(&prompt).await?)?;
    event!(Level::DEBUG, %candidate, "Oracle produced candidate query.");
    Ok(candidate)
  }
}
