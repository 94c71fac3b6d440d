// homebites/src/pipeline/execution.rs

//! Contains the `Pipeline::run()` method, responsible for executing the pipeline's steps and handlers.

use crate::core::context::Handler;
use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::error::PipelineError;
use crate::pipeline::definition::Pipeline;
use tracing::{event, instrument, span, Instrument, Level, Span};

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PipelineError> + Send + Sync + 'static,
{
  /// Executes the pipeline against the given shared context `ctx_data`.
  ///
  /// Steps run in order, each as `before` → `on` → `after`. A step whose
  /// `skip_if` holds is skipped entirely. A step with no `on` handlers is
  /// skipped when optional and is a `PipelineError::HandlerMissing` otherwise.
  /// The first handler error aborts the run and is returned as-is.
  #[instrument(
        name = "Pipeline::run",
        skip_all,
        fields(
            pipeline_context_data_type = %std::any::type_name::<TData>(),
            num_steps = self.steps.len(),
        ),
        err(Display)
    )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    event!(Level::DEBUG, "Pipeline execution starting.");

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name_str = step_def.name.as_str();

      // Spans are attached to the handler futures rather than entered, so the
      // run future stays `Send`.
      let step_span = span!(
        Level::INFO,
        "pipeline_step_execution",
        step_name = step_name_str,
        step_index = step_idx,
        optional = step_def.optional
      );

      if let Some(skip_cond_fn) = &step_def.skip_if {
        if skip_cond_fn(ctx_data.clone()) {
          step_span.in_scope(|| event!(Level::DEBUG, "Step skipped due to 'skip_if' condition."));
          continue;
        }
      }

      let on_handlers = match self.on.get(step_name_str) {
        Some(handlers) if !handlers.is_empty() => handlers.as_slice(),
        _ if step_def.optional => {
          step_span.in_scope(|| event!(Level::DEBUG, "Optional step has no handlers, skipping."));
          continue;
        }
        _ => {
          step_span.in_scope(|| event!(Level::ERROR, "Non-optional step has no handlers."));
          return Err(Err::from(PipelineError::HandlerMissing {
            step_name: step_def.name.clone(),
          }));
        }
      };

      let phases: [(&str, &[Handler<TData, Err>]); 3] = [
        ("before", self.before.get(step_name_str).map(Vec::as_slice).unwrap_or(&[])),
        ("on", on_handlers),
        ("after", self.after.get(step_name_str).map(Vec::as_slice).unwrap_or(&[])),
      ];

      for (phase, handlers) in phases {
        if let PipelineControl::Stop = run_phase(&step_span, phase, handlers, &ctx_data).await? {
          return Ok(PipelineResult::Stopped);
        }
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed.");
    Ok(PipelineResult::Completed)
  }
}

async fn run_phase<TData, Err>(
  step_span: &Span,
  phase: &'static str,
  handlers: &[Handler<TData, Err>],
  ctx_data: &ContextData<TData>,
) -> Result<PipelineControl, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + Send + Sync + 'static,
{
  for (handler_idx, handler_fn) in handlers.iter().enumerate() {
    let handler_span = span!(parent: step_span, Level::DEBUG, "handler", phase, handler_index = handler_idx);
    match handler_fn(ctx_data.clone()).instrument(handler_span).await {
      Ok(PipelineControl::Continue) => {}
      Ok(PipelineControl::Stop) => {
        step_span.in_scope(|| event!(Level::DEBUG, phase, "Pipeline stopped by a handler."));
        return Ok(PipelineControl::Stop);
      }
      Err(e) => {
        step_span.in_scope(|| event!(Level::DEBUG, phase, error = %e, "Handler failed."));
        return Err(e);
      }
    }
  }
  Ok(PipelineControl::Continue)
}
