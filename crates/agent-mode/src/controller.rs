use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::action::{Action, ActionName};
use crate::config::AgentConfig;
use crate::context::{ContextItem, ContextLog};
use crate::error::{AgentError, AgentResult};
use crate::executor::{ToolExecutor, ToolResult};
use crate::language_model::{ChatMessage, LanguageModelClient};
use crate::parser::{fallback_action, ResponseParser};
use crate::progress::{describe_action, AgentStatus, ProgressCallback, ProgressUpdate};
use crate::prompts;

const PARSE_ERROR: &str = "Could not parse your response as JSON";
const PARTIAL_NOTE: &str = "Partial results due to iteration limit";

/// Cloneable handle for cancelling a run from another task.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Clears the running flag when the run future completes or is dropped.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct RunState {
    task: String,
    context: ContextLog,
    iterations: u32,
}

impl RunState {
    fn reset(&mut self, task: &str) {
        self.task = task.to_string();
        self.context.clear();
        self.iterations = 0;
    }
}

/// Serializable view of the current (or last) run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub task: String,
    pub iterations: u32,
    pub max_iterations: u32,
    pub context: Vec<ContextItem>,
    pub running: bool,
    pub cancelled: bool,
}

/// Drives one task at a time through plan -> execute -> observe -> replan.
pub struct AgentController {
    model: Arc<dyn LanguageModelClient>,
    executor: Box<dyn ToolExecutor>,
    config: AgentConfig,
    parser: ResponseParser,
    progress: Option<ProgressCallback>,
    running: AtomicBool,
    cancelled: Arc<AtomicBool>,
    state: Mutex<RunState>,
}

impl AgentController {
    pub fn new(
        model: Arc<dyn LanguageModelClient>,
        executor: Box<dyn ToolExecutor>,
        config: AgentConfig,
    ) -> Self {
        let parser = ResponseParser::new(config.parser.clone());
        let state = RunState {
            task: String::new(),
            context: ContextLog::new(config.max_context_items),
            iterations: 0,
        };
        Self {
            model,
            executor,
            config,
            parser,
            progress: None,
            running: AtomicBool::new(false),
            cancelled: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(state),
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Requests cancellation. Takes effect at the next iteration boundary or
    /// before the next model call; in-flight calls are allowed to finish.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            debug!("agent cancellation requested");
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancelled.clone())
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let state = self.lock_state();
        RunSnapshot {
            task: state.task.clone(),
            iterations: state.iterations,
            max_iterations: self.config.max_iterations,
            context: state.context.items().cloned().collect(),
            running: self.is_running(),
            cancelled: self.is_cancelled(),
        }
    }

    /// Runs `task` to completion.
    ///
    /// Returns the compiled answer, or `None` when the run was cancelled.
    ///
    /// Dropping the returned future releases the controller for the next run
    /// but skips [`ToolExecutor::finish_run`]; the next [`ToolExecutor::begin_run`]
    /// reclaims whatever the abandoned run left open.
    pub async fn run(&self, task: &str) -> AgentResult<Option<String>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AgentError::AlreadyRunning);
        }
        let _guard = RunGuard(&self.running);

        self.cancelled.store(false, Ordering::SeqCst);
        self.lock_state().reset(task);
        self.executor.begin_run().await;

        info!(task, max_iterations = self.config.max_iterations, "agent run started");
        self.emit(ProgressUpdate::new(AgentStatus::Starting, "Agent mode activated").with_task(task));

        let outcome = self.drive(task).await;
        if let Err(err) = &outcome {
            error!(error = %err, "agent run failed");
            self.emit(
                ProgressUpdate::new(AgentStatus::Error, format!("Error: {err}"))
                    .with_error(err.to_string()),
            );
        }

        self.executor.finish_run().await;
        outcome
    }

    async fn drive(&self, task: &str) -> AgentResult<Option<String>> {
        self.emit(
            ProgressUpdate::new(AgentStatus::Planning, "Creating execution plan...").with_step(1),
        );
        let plan = self.call_model(prompts::SYSTEM, &prompts::plan(task)).await?;
        let mut current = self
            .accept(task, &plan, 0)
            .ok_or(AgentError::PlanFailed)?;
        self.lock_state()
            .context
            .push("plan", Value::String(current.reasoning.clone()));

        loop {
            if self.is_cancelled() {
                return Ok(self.finish_cancelled());
            }
            let Some(step) = self.next_iteration() else {
                break;
            };

            if current.name == ActionName::Complete {
                return self.complete(task, step).await.map(Some);
            }

            debug!(step, action = %current.name, "dispatching action");
            self.emit(
                ProgressUpdate::new(AgentStatus::Executing, describe_action(&current))
                    .with_step(step)
                    .with_action(current.name),
            );
            let result = self.executor.execute(&current).await?;
            let recorded = serde_json::to_value(&result).unwrap_or_default();
            self.lock_state()
                .context
                .push(current.name.as_str(), recorded.clone());
            self.emit(
                ProgressUpdate::new(AgentStatus::Thinking, "Analyzing results...")
                    .with_step(step)
                    .with_result(recorded),
            );

            if self.is_cancelled() {
                return Ok(self.finish_cancelled());
            }
            match self.next_action(task, &result).await? {
                Some(action) => current = action,
                None => return Ok(self.finish_cancelled()),
            }
        }

        warn!(
            max_iterations = self.config.max_iterations,
            "iteration budget exhausted, compiling partial results"
        );
        self.emit(ProgressUpdate::new(
            AgentStatus::MaxIterations,
            "Max iterations reached, compiling partial results...",
        ));
        let partial = self.generate_final_response(task, Some(PARTIAL_NOTE)).await?;
        self.emit(
            ProgressUpdate::new(AgentStatus::Complete, "Task complete (partial results)")
                .with_result(Value::String(partial.clone())),
        );
        Ok(Some(partial))
    }

    /// Asks for the next action, re-prompting and finally falling back when
    /// the reply cannot be turned into a valid action. `None` means the run
    /// was cancelled while recovering.
    async fn next_action(&self, task: &str, last: &ToolResult) -> AgentResult<Option<Action>> {
        let (digest, item_count) = {
            let state = self.lock_state();
            (state.context.render(), state.context.len())
        };

        let reply = self
            .call_model(
                prompts::SYSTEM,
                &prompts::next_action(task, &digest, item_count, last),
            )
            .await?;
        if let Some(action) = self.accept(task, &reply, item_count) {
            return Ok(Some(action));
        }

        if self.config.recovery_prompts {
            warn!("could not parse model reply, re-prompting");
            let attempts = [
                (prompts::SYSTEM, prompts::recover(PARSE_ERROR, task, item_count)),
                (
                    prompts::STRICT_JSON_SYSTEM,
                    prompts::minimal_choice(task, item_count),
                ),
            ];
            for (system, prompt) in attempts {
                if self.is_cancelled() {
                    return Ok(None);
                }
                let reply = self.call_model(system, &prompt).await?;
                if let Some(action) = self.accept(task, &reply, item_count) {
                    return Ok(Some(action));
                }
            }
        }

        let fallback = fallback_action(task, item_count);
        warn!(action = %fallback.name, "all parsing failed, using fallback action");
        self.emit(ProgressUpdate::new(AgentStatus::Recovering, "Adapting strategy..."));
        Ok(Some(fallback))
    }

    fn accept(&self, task: &str, reply: &str, context_len: usize) -> Option<Action> {
        let action = self.parser.parse(reply, context_len)?.with_default_query(task);
        match action.validate() {
            Ok(()) => Some(action),
            Err(err) => {
                debug!(error = %err, "discarding invalid action");
                None
            }
        }
    }

    async fn complete(&self, task: &str, step: u32) -> AgentResult<String> {
        self.emit(
            ProgressUpdate::new(AgentStatus::Completing, "Compiling final response...")
                .with_step(step),
        );
        let answer = self.generate_final_response(task, None).await?;
        info!(iterations = step, "agent run complete");
        self.emit(
            ProgressUpdate::new(AgentStatus::Complete, "Task complete!")
                .with_result(Value::String(answer.clone())),
        );
        Ok(answer)
    }

    async fn generate_final_response(&self, task: &str, note: Option<&str>) -> AgentResult<String> {
        let digest = self.lock_state().context.render();
        self.call_model(
            prompts::COMPLETION_SYSTEM,
            &prompts::complete(task, &digest, note),
        )
        .await
    }

    async fn call_model(&self, system_prompt: &str, prompt: &str) -> AgentResult<String> {
        self.model
            .send(&[ChatMessage::user(prompt)], system_prompt)
            .await
            .map_err(AgentError::Model)
    }

    fn next_iteration(&self) -> Option<u32> {
        let mut state = self.lock_state();
        if state.iterations >= self.config.max_iterations {
            return None;
        }
        state.iterations += 1;
        Some(state.iterations)
    }

    fn finish_cancelled(&self) -> Option<String> {
        info!("agent run cancelled");
        self.emit(ProgressUpdate::new(
            AgentStatus::Cancelled,
            "Agent cancelled by user",
        ));
        None
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn emit(&self, mut update: ProgressUpdate) {
        let Some(callback) = &self.progress else {
            return;
        };
        {
            let state = self.lock_state();
            update.iterations = state.iterations;
            update.context_size = state.context.len();
        }
        update.max_iterations = self.config.max_iterations;
        callback(&update);
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
