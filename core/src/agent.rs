// homebites/src/agent.rs

//! The answer pipeline: `answer(question) -> String`.
//!
//! One run per question over a request-local `AnswerCtxData`:
//!
//! ```text
//! classify_topic -> answer_from_description (platform questions, stops here)
//!                -> translate_question -> authorize_query -> execute_query
//! ```
//!
//! Every failure is turned into a user-visible sentence at the `answer`
//! boundary.

use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use crate::core::step::SkipCondition;
use crate::error::{AgentError, PipelineError};
use crate::executor::{DocumentStore, Executor};
use crate::gate::{ApprovedQuery, SafetyGate};
use crate::oracle::Oracle;
use crate::pipeline::Pipeline;
use crate::responder::DescriptionResponder;
use crate::router::{classify, Topic};
use crate::schema::SchemaRegistry;
use crate::translator::QueryTranslator;
use std::sync::Arc;
use tracing::{event, info, instrument, warn, Level};

/// Shared, read-only collaborators. Built once at startup and cloned into
/// each run's context.
#[derive(Clone)]
pub struct AgentServices {
  pub schema: Arc<SchemaRegistry>,
  pub translator: QueryTranslator,
  pub gate: SafetyGate,
  pub executor: Executor,
  pub responder: DescriptionResponder,
}

impl AgentServices {
  pub fn new(oracle: Arc<dyn Oracle>, store: Arc<dyn DocumentStore>) -> Self {
    let schema = Arc::new(SchemaRegistry::homebites());
    Self {
      translator: QueryTranslator::new(oracle.clone(), schema.clone()),
      gate: SafetyGate::new(schema.clone()),
      executor: Executor::new(store),
      responder: DescriptionResponder::new(oracle),
      schema,
    }
  }
}

/// Per-question state of the answer pipeline.
#[derive(Clone)]
pub struct AnswerCtxData {
  pub services: AgentServices,
  pub question: String,
  pub topic: Option<Topic>,
  pub candidate_query: Option<String>,
  pub approved_query: Option<ApprovedQuery>,
  pub response: Option<String>,
}

impl AnswerCtxData {
  pub fn new(services: AgentServices, question: &str) -> Self {
    Self {
      services,
      question: question.to_string(),
      topic: None,
      candidate_query: None,
      approved_query: None,
      response: None,
    }
  }
}

pub const ANSWER_STEPS: &[&str] = &[
  "classify_topic",
  "answer_from_description",
  "translate_question",
  "authorize_query",
  "execute_query",
];

fn missing(what: &str) -> AgentError {
  AgentError::Pipeline(PipelineError::Internal(format!("{} not set by an earlier step", what)))
}

/// Builds the answer pipeline with all handlers registered.
pub fn build_answer_pipeline() -> Pipeline<AnswerCtxData, AgentError> {
  let not_platform: SkipCondition<AnswerCtxData> =
    Arc::new(|ctx_data: ContextData<AnswerCtxData>| ctx_data.read().topic != Some(Topic::PlatformDescription));

  let mut p = Pipeline::<AnswerCtxData, AgentError>::new(&[
    ("classify_topic", false, None),
    ("answer_from_description", false, Some(not_platform)),
    ("translate_question", false, None),
    ("authorize_query", false, None),
    ("execute_query", false, None),
  ]);

  p.on_root("classify_topic", |ctx_data: ContextData<AnswerCtxData>| {
    Box::pin(async move {
      let question = ctx_data.read().question.clone();
      if question.trim().is_empty() {
        warn!("Blank question received.");
        return Err(AgentError::OutOfScope);
      }
      let topic = classify(&question);
      ctx_data.write().topic = Some(topic);
      Ok::<_, AgentError>(PipelineControl::Continue)
    })
  });

  p.after_root("classify_topic", |ctx_data: ContextData<AnswerCtxData>| {
    Box::pin(async move {
      let topic = ctx_data.read().topic;
      event!(Level::INFO, ?topic, "Question classified.");
      Ok::<_, AgentError>(PipelineControl::Continue)
    })
  });

  p.on_root("answer_from_description", |ctx_data: ContextData<AnswerCtxData>| {
    Box::pin(async move {
      let (responder, question) = {
        let guard = ctx_data.read();
        (guard.services.responder.clone(), guard.question.clone())
      };

      let answer = responder.respond(&question).await?;
      ctx_data.write().response = Some(answer);
      Ok::<_, AgentError>(PipelineControl::Stop)
    })
  });

  p.on_root("translate_question", |ctx_data: ContextData<AnswerCtxData>| {
    Box::pin(async move {
      let (translator, question) = {
        let guard = ctx_data.read();
        (guard.services.translator.clone(), guard.question.clone())
      };

      let candidate = translator.translate(&question).await?;
      ctx_data.write().candidate_query = Some(candidate);
      Ok::<_, AgentError>(PipelineControl::Continue)
    })
  });

  p.on_root("authorize_query", |ctx_data: ContextData<AnswerCtxData>| {
    Box::pin(async move {
      let approved = {
        let guard = ctx_data.read();
        let candidate = guard.candidate_query.as_deref().ok_or_else(|| missing("candidate_query"))?;
        guard.services.gate.authorize(candidate)?
      };
      ctx_data.write().approved_query = Some(approved);
      Ok::<_, AgentError>(PipelineControl::Continue)
    })
  });

  p.on_root("execute_query", |ctx_data: ContextData<AnswerCtxData>| {
    Box::pin(async move {
      let (executor, approved) = {
        let guard = ctx_data.read();
        let approved = guard.approved_query.clone().ok_or_else(|| missing("approved_query"))?;
        (guard.services.executor.clone(), approved)
      };

      let output = executor.execute(&approved).await?;
      ctx_data.write().response = Some(output.render());
      Ok::<_, AgentError>(PipelineControl::Continue)
    })
  });

  p
}

/// Answers natural-language questions about HomeBites.
#[derive(Clone)]
pub struct Agent {
  services: AgentServices,
  pipeline: Arc<Pipeline<AnswerCtxData, AgentError>>,
}

impl Agent {
  pub fn new(oracle: Arc<dyn Oracle>, store: Arc<dyn DocumentStore>) -> Self {
    Self::with_services(AgentServices::new(oracle, store))
  }

  pub fn with_services(services: AgentServices) -> Self {
    Self {
      services,
      pipeline: Arc::new(build_answer_pipeline()),
    }
  }

  pub fn services(&self) -> &AgentServices {
    &self.services
  }

  /// Runs the answer pipeline and returns either the answer or the failure.
  #[instrument(name = "Agent::try_answer", skip_all, fields(question_len = question.len()))]
  pub async fn try_answer(&self, question: &str) -> Result<String, AgentError> {
    let ctx_data = ContextData::new(AnswerCtxData::new(self.services.clone(), question));
    let result = self.pipeline.run(ctx_data.clone()).await?;
    event!(Level::DEBUG, ?result, "Answer pipeline finished.");

    let response = ctx_data.read().response.clone();
    response.ok_or_else(|| missing("response"))
  }

  /// Always returns a string: the answer, or the sentence for whatever failed.
  pub async fn answer(&self, question: &str) -> String {
    match self.try_answer(question).await {
      Ok(response) => response,
      Err(e) => {
        info!(error = %e, "Question answered with a failure message.");
        e.user_message()
      }
    }
  }
}
