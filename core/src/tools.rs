// homebites/src/tools.rs

//! Named, string-in/string-out tools for an external orchestration agent.
//!
//! Each tool wraps one of the agent's components. Tools never fail: errors
//! come back as the same sentences `Agent::answer` would produce.

use crate::agent::AgentServices;
use crate::error::AgentError;
use serde::Serialize;
use tracing::{event, instrument, Level};

pub const SEARCH_DATABASE: &str = "SearchDatabase";
pub const EXECUTE_QUERY: &str = "ExecuteQuery";
pub const HOMEBITES_ASSISTANT: &str = "HomeBitesAssistant";

/// Returned by [`ToolKit::invoke`] for a name it does not know.
pub const UNKNOWN_TOOL_MESSAGE: &str =
  "Unknown tool. Available tools are SearchDatabase, ExecuteQuery and HomeBitesAssistant.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolSpec {
  pub name: &'static str,
  pub description: &'static str,
}

pub const TOOL_SPECS: &[ToolSpec] = &[
  ToolSpec {
    name: SEARCH_DATABASE,
    description: "Use this to answer questions about users, chefs, orders, or meals from the database. \
                  Returns a MongoDB query string for the question.",
  },
  ToolSpec {
    name: EXECUTE_QUERY,
    description: "Executes a read-only MongoDB query string like db.users.countDocuments({role: \"chef\"}) \
                  and returns the result.",
  },
  ToolSpec {
    name: HOMEBITES_ASSISTANT,
    description: "Answers questions about the HomeBites system. It does not answer general knowledge or web questions.",
  },
];

#[derive(Clone)]
pub struct ToolKit {
  services: AgentServices,
}

impl ToolKit {
  pub fn new(services: AgentServices) -> Self {
    Self { services }
  }

  pub fn specs(&self) -> &'static [ToolSpec] {
    TOOL_SPECS
  }

  /// Runs the tool called `name` on `input`.
  #[instrument(name = "ToolKit::invoke", skip(self, input))]
  pub async fn invoke(&self, name: &str, input: &str) -> String {
    match name {
      SEARCH_DATABASE => self.search_database(input).await,
      EXECUTE_QUERY => self.execute_query(input).await,
      HOMEBITES_ASSISTANT => self.homebites_assistant(input).await,
      _ => {
        event!(Level::WARN, tool = %name, "Unknown tool requested.");
        UNKNOWN_TOOL_MESSAGE.to_string()
      }
    }
  }

  /// Question in, candidate query out. The candidate is not authorized.
  pub async fn search_database(&self, question: &str) -> String {
    self
      .services
      .translator
      .translate(question)
      .await
      .unwrap_or_else(|e| AgentError::from(e).user_message())
  }

  /// Authorizes and runs a query string.
  pub async fn execute_query(&self, query: &str) -> String {
    let approved = match self.services.gate.authorize(query) {
      Ok(approved) => approved,
      Err(rejection) => return AgentError::from(rejection).user_message(),
    };
    match self.services.executor.execute(&approved).await {
      Ok(output) => output.render(),
      Err(e) => AgentError::from(e).user_message(),
    }
  }

  pub async fn homebites_assistant(&self, question: &str) -> String {
    self
      .services
      .responder
      .respond(question)
      .await
      .unwrap_or_else(|e| e.user_message())
  }
}
