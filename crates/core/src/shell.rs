//! Line-level shell over one engine and one session.
//!
//! Handles the few directives that are not commands (`menu`, `back`,
//! `history`, `exit`) and hands everything else to the [`Engine`].

use crate::address::Menu;
use crate::engine::{CancelSignal, ChainOutcome, Engine};
use crate::error::ParseError;
use crate::session::{Session, StepResult};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::debug;

/// What a single input line produced.
#[derive(Debug, Clone)]
pub enum Response {
    Outcome(ChainOutcome),
    Menu(Menu),
    History(Vec<StepResult>),
    Exit,
    Rejected(ParseError),
}

impl Response {
    /// JSON rendering used by the CLI transcript.
    pub fn to_json(&self) -> Value {
        match self {
            Response::Outcome(outcome) => serde_json::to_value(outcome).unwrap_or_default(),
            Response::Menu(menu) => serde_json::to_value(menu).unwrap_or_default(),
            Response::History(results) => json!({ "history": results }),
            Response::Exit => json!({ "exit": true }),
            Response::Rejected(err) => json!({ "rejected": err.to_string() }),
        }
    }

    /// Rejected lines and failed outcomes count as failures.
    pub fn is_failure(&self) -> bool {
        match self {
            Response::Outcome(outcome) => !outcome.success,
            Response::Rejected(_) => true,
            _ => false,
        }
    }
}

/// An engine bound to one session.
pub struct TreeShell {
    engine: Engine,
    session: Session,
}

impl TreeShell {
    pub fn new(engine: Engine) -> Self {
        let session = engine.new_session();
        Self { engine, session }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn handle(&mut self, line: &str) -> Response {
        self.dispatch(line, None).await
    }

    pub async fn handle_cancellable(&mut self, line: &str, cancel: &CancelSignal) -> Response {
        self.dispatch(line, Some(cancel)).await
    }

    /// The menu at the navigation cursor.
    pub fn current_menu(&self) -> Menu {
        let cursor = self.session.nav.cursor();
        self.engine.space().menu(cursor).unwrap_or_else(|| Menu {
            address: cursor.clone(),
            label: String::new(),
            description: None,
            args: BTreeMap::new(),
            options: Vec::new(),
        })
    }

    async fn dispatch(&mut self, line: &str, cancel: Option<&CancelSignal>) -> Response {
        let line = line.trim();
        match line.to_ascii_lowercase().as_str() {
            "" | "menu" => return Response::Menu(self.current_menu()),
            "back" => {
                if !self.session.nav.back() {
                    debug!(session = %self.session.id, "Already at start");
                }
                return Response::Menu(self.current_menu());
            }
            "history" => return Response::History(self.session.state.results().to_vec()),
            "exit" | "quit" => return Response::Exit,
            _ => {}
        }

        let command = match crate::command::parse_line(line) {
            Ok(command) => command,
            Err(err) => {
                debug!(session = %self.session.id, error = %err, "Rejected line");
                return Response::Rejected(err);
            }
        };
        Response::Outcome(self.engine.execute(&command, &mut self.session, cancel).await)
    }
}
