//! Execution Engine — runs parsed lines step by step against a session.
//!
//! Per line:
//!
//! ```text
//! PARSED -> RESOLVING(i) -> EXECUTING(i) -> RECORDED(i) -> RESOLVING(i+1) | DONE
//!                                                \-> ABORTED on failure
//! ```
//!
//! Each executed step appends exactly one [`StepResult`] to the session, in
//! order, before the next step's arguments are substituted. The handler call
//! is the only suspension point.

use crate::address::{Address, AddressSpace, Node};
use crate::command::{ChainStep, Command, Target, parse_line};
use crate::error::{ParseError, StepError, StepErrorKind};
use crate::handler::{HandlerContext, HandlerRegistry};
use crate::session::{Session, StepResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Engine behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Keep running later steps after a failed one.
    #[serde(default)]
    pub continue_on_error: bool,
}

/// What the caller gets back for every executed line.
#[derive(Debug, Clone, Serialize)]
pub struct ChainOutcome {
    /// This line's results, in execution order
    pub steps: Vec<StepResult>,

    /// AND of every step's success
    pub success: bool,

    /// The line was cancelled before all steps ran
    pub cancelled: bool,

    /// Navigation cursor after the line
    pub cursor: Address,
}

/// Requests cancellation of an in-flight line.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observed by the engine between steps and during handler calls.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; never if the handle is dropped first.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Drives parsed commands against an [`AddressSpace`] and a [`HandlerRegistry`].
#[derive(Debug, Clone)]
pub struct Engine {
    space: Arc<AddressSpace>,
    handlers: Arc<HandlerRegistry>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(space: Arc<AddressSpace>, handlers: Arc<HandlerRegistry>) -> Self {
        Self {
            space,
            handlers,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn space(&self) -> &AddressSpace {
        &self.space
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// A fresh session whose cursor starts at the tree root.
    pub fn new_session(&self) -> Session {
        let start = self
            .space
            .root()
            .map(|n| n.address.clone())
            .unwrap_or_else(Address::root);
        Session::new(start)
    }

    /// Action nodes whose handler id has no registered handler.
    pub fn unbound_nodes(&self) -> Vec<&Node> {
        self.space
            .iter()
            .filter(|n| {
                n.handler_id
                    .as_deref()
                    .is_some_and(|id| !self.handlers.contains(id))
            })
            .collect()
    }

    /// Parse and execute one line.
    pub async fn execute_line(
        &self,
        line: &str,
        session: &mut Session,
    ) -> Result<ChainOutcome, ParseError> {
        let command = parse_line(line)?;
        Ok(self.execute(&command, session, None).await)
    }

    /// Parse and execute one line, stopping early if `cancel` fires.
    pub async fn execute_line_cancellable(
        &self,
        line: &str,
        session: &mut Session,
        cancel: &CancelSignal,
    ) -> Result<ChainOutcome, ParseError> {
        let command = parse_line(line)?;
        Ok(self.execute(&command, session, Some(cancel)).await)
    }

    /// Execute an already-parsed command.
    pub async fn execute(
        &self,
        command: &Command,
        session: &mut Session,
        cancel: Option<&CancelSignal>,
    ) -> ChainOutcome {
        let planned = command.steps().len();
        info!(session = %session.id, steps = planned, "Executing line");

        let mut steps = Vec::with_capacity(planned);
        let mut last_resolved = None;
        let mut cancelled = false;

        for (i, step) in command.steps().iter().enumerate() {
            if cancel.is_some_and(CancelSignal::is_cancelled) {
                warn!(session = %session.id, remaining = planned - i, "Line cancelled");
                cancelled = true;
                break;
            }

            let (result, resolved) = self.run_step(step, session, cancel).await;
            if resolved.is_some() {
                last_resolved = resolved;
            }

            let failed = !result.success;
            cancelled = result.error_kind == Some(StepErrorKind::Cancelled);
            steps.push(result);

            if cancelled || (failed && !self.options.continue_on_error) {
                if i + 1 < planned {
                    warn!(
                        session = %session.id,
                        step = i + 1,
                        skipped = planned - i - 1,
                        "Aborting chain"
                    );
                }
                break;
            }
        }

        if command.moves_cursor() {
            if let Some(address) = last_resolved {
                session.nav.move_to(address);
            }
        }

        let success = !cancelled && steps.iter().all(|r| r.success);
        ChainOutcome {
            steps,
            success,
            cancelled,
            cursor: session.nav.cursor().clone(),
        }
    }

    /// Run one step and record its result. Also returns the address if it resolved.
    async fn run_step(
        &self,
        step: &ChainStep,
        session: &mut Session,
        cancel: Option<&CancelSignal>,
    ) -> (StepResult, Option<Address>) {
        let index = session.state.next_index();
        let address = match &step.target {
            Target::Absolute(address) => address.clone(),
            Target::Relative(n) => session.nav.cursor().child(*n),
        };
        debug!(session = %session.id, step = index, target = %step.target, address = %address, "Resolving step");

        let (outcome, resolved) = match self.space.resolve(&address) {
            Some(node) => (
                self.invoke(node, step, session, cancel).await,
                Some(address.clone()),
            ),
            None => (
                Err((
                    Value::Object(step.raw_args.clone()),
                    StepError::AddressNotFound(address.to_string()),
                )),
                None,
            ),
        };

        let result = match outcome {
            Ok((args, output)) => StepResult::success(index, address, args, output),
            Err((args, err)) => {
                warn!(session = %session.id, step = index, error = %err, "Step failed");
                StepResult::failure(index, address, args, &err)
            }
        };

        if let Err(e) = session.state.append(result.clone()) {
            error!(session = %session.id, error = %e, "Result log out of sequence");
        }
        (result, resolved)
    }

    /// Substitute arguments and call the node's handler.
    async fn invoke(
        &self,
        node: &Node,
        step: &ChainStep,
        session: &mut Session,
        cancel: Option<&CancelSignal>,
    ) -> Result<(Value, Value), (Value, StepError)> {
        let args = step
            .args
            .resolve(session.state.results())
            .map_err(|e| (Value::Object(step.raw_args.clone()), e.into()))?;

        let Some(handler_id) = node.handler_id.as_deref() else {
            let menu = self.space.menu(&node.address);
            return Ok((args, serde_json::to_value(menu).unwrap_or_default()));
        };

        debug!(session = %session.id, address = %node.address, handler = handler_id, "Invoking handler");
        let (results, context, agents) = session.state.parts_mut();
        let mut cx = HandlerContext {
            session_id: &session.id,
            address: &node.address,
            results,
            context,
            agents,
        };

        let call = self.handlers.invoke(handler_id, args.clone(), &mut cx);
        let output = match cancel {
            Some(signal) => tokio::select! {
                out = call => out.map_err(StepError::from),
                _ = signal.cancelled() => Err(StepError::Cancelled),
            },
            None => call.await.map_err(StepError::from),
        };

        match output {
            Ok(value) => Ok((args, value)),
            Err(e) => Err((args, e)),
        }
    }
}
