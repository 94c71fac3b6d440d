// homebites/src/responder.rs

//! The Description Responder: answers questions about the platform itself
//! from a fixed description, without touching the database.

use crate::error::{AgentError, OUT_OF_SCOPE_MESSAGE};
use crate::oracle::{non_empty, Oracle};
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Everything the responder is allowed to know about HomeBites.
pub const PLATFORM_DESCRIPTION: &str = "\
HomeBites is a platform that connects home chefs with customers looking for homemade food.
Chefs can create profiles, list their meals, and manage orders.
Customers can browse meals, place orders, and leave reviews.
The platform includes dashboards for chefs and customers, a cart for managing orders, and a notification system for updates.
It uses a secure card payment system, and only registered users who are logged in can add items to the cart and place orders.";

const FINAL_ANSWER_MARKER: &str = "Final Answer:";

#[derive(Clone)]
pub struct DescriptionResponder {
  oracle: Arc<dyn Oracle>,
}

impl DescriptionResponder {
  pub fn new(oracle: Arc<dyn Oracle>) -> Self {
    Self { oracle }
  }

  pub fn prompt_for(&self, question: &str) -> String {
    format!(
      "You are an AI assistant for a platform called HomeBites. \
       You must only answer questions specifically about the HomeBites system.\n\n\
       System Description:\n{description}\n\n\
       Instructions:\n\
       - Only answer questions directly related to the HomeBites system.\n\
       - If the question is not related to HomeBites, respond with exactly:\n  \"{out_of_scope}\"\n\
       - If the question is related to HomeBites, give a detailed and factual answer based only on the system description above.\n\
       - Do not explain your reasoning or show any thinking process.\n\
       - Do not invent details that are not in the description.\n\
       - Respond with:\n  {marker} <your answer here>\n\n\
       Question: {question}\n\
       Answer:",
      description = PLATFORM_DESCRIPTION,
      out_of_scope = OUT_OF_SCOPE_MESSAGE,
      marker = FINAL_ANSWER_MARKER,
      question = question.trim(),
    )
  }

  #[instrument(name = "DescriptionResponder::respond", skip_all)]
  pub async fn respond(&self, question: &str) -> Result<String, AgentError> {
    let completion = non_empty(self.oracle.complete(&self.prompt_for(question)).await?)?;
    let answer = strip_final_answer(&completion);

    if answer.contains(OUT_OF_SCOPE_MESSAGE) {
      event!(Level::INFO, "Question declared out of scope.");
      return Err(AgentError::OutOfScope);
    }
    let answer = non_empty(answer.to_string())?;
    event!(Level::DEBUG, answer_len = answer.len(), "Description answer produced.");
    Ok(answer)
  }
}

/// Drops everything up to and including a `Final Answer:` marker, if present.
pub fn strip_final_answer(completion: &str) -> &str {
  let trimmed = completion.trim();
  match trimmed.find(FINAL_ANSWER_MARKER) {
    Some(idx) => trimmed[idx + FINAL_ANSWER_MARKER.len()..].trim(),
    None => trimmed,
  }
}
