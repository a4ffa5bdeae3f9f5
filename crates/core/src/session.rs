//! Session State — the single mutable record threaded through execution.
//!
//! A session owns an append-only log of [`StepResult`]s, a free-form context
//! map for handlers, a registry of long-lived agent handles, and the
//! navigation cursor. Sessions never share state with each other.

use crate::address::Address;
use crate::error::{StepError, StepErrorKind};
use crate::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The immutable record of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// 1-based position in the session's whole history
    pub index: usize,

    pub address: Address,

    pub success: bool,

    /// Handler output; `null` for failed steps
    pub output: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<StepErrorKind>,

    /// Arguments after substitution (raw arguments if substitution failed)
    #[serde(default)]
    pub args: Value,

    pub recorded_at: DateTime<Utc>,
}

impl StepResult {
    pub fn success(index: usize, address: Address, args: Value, output: Value) -> Self {
        Self {
            index,
            address,
            success: true,
            output,
            error: None,
            error_kind: None,
            args,
            recorded_at: Utc::now(),
        }
    }

    pub fn failure(index: usize, address: Address, args: Value, error: &StepError) -> Self {
        Self {
            index,
            address,
            success: false,
            output: Value::Null,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            args,
            recorded_at: Utc::now(),
        }
    }
}

/// Returned by [`SessionState::append`] when a result is out of sequence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("result index {got} out of sequence (expected {expected})")]
pub struct OutOfSequence {
    pub expected: usize,
    pub got: usize,
}

/// A named, long-lived agent that handlers create, reuse or evict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHandle {
    pub name: String,

    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Conversation so far, oldest first
    #[serde(default)]
    pub history: Vec<Message>,

    pub created_at: DateTime<Utc>,

    pub last_used: DateTime<Utc>,
}

impl AgentHandle {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            model: model.into(),
            system_prompt: None,
            history: Vec::new(),
            created_at: now,
            last_used: now,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Number of completed user/assistant exchanges.
    pub fn turns(&self) -> usize {
        self.history
            .iter()
            .filter(|m| m.role == crate::message::Role::Assistant)
            .count()
    }

    pub fn push(&mut self, message: Message) {
        self.last_used = Utc::now();
        self.history.push(message);
    }
}

/// Registry of agent handles keyed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRegistry {
    agents: BTreeMap<String, AgentHandle>,
}

impl AgentRegistry {
    pub fn get(&self, name: &str) -> Option<&AgentHandle> {
        self.agents.get(name)
    }

    /// Insert or replace an agent.
    pub fn insert(&mut self, agent: AgentHandle) -> Option<AgentHandle> {
        self.agents.insert(agent.name.clone(), agent)
    }

    pub fn evict(&mut self, name: &str) -> Option<AgentHandle> {
        self.agents.remove(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentHandle> {
        self.agents.values()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Results log, shared context and agent registry for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    results: Vec<StepResult>,

    /// Free-form bookkeeping for handlers
    pub context: Map<String, Value>,

    pub agents: AgentRegistry,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next appended result must carry.
    pub fn next_index(&self) -> usize {
        self.results.len() + 1
    }

    /// Append a result. Indices must be contiguous from 1.
    pub fn append(&mut self, result: StepResult) -> Result<&StepResult, OutOfSequence> {
        let expected = self.next_index();
        if result.index != expected {
            return Err(OutOfSequence {
                expected,
                got: result.index,
            });
        }
        self.results.push(result);
        Ok(&self.results[expected - 1])
    }

    /// Look up a result by its 1-based index.
    pub fn get(&self, index: usize) -> Option<&StepResult> {
        index.checked_sub(1).and_then(|i| self.results.get(i))
    }

    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub fn last(&self) -> Option<&StepResult> {
        self.results.last()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Borrow the results log read-only alongside the handler-writable parts.
    pub fn parts_mut(&mut self) -> (&[StepResult], &mut Map<String, Value>, &mut AgentRegistry) {
        (&self.results, &mut self.context, &mut self.agents)
    }
}

/// The navigation cursor and its back-stack.
#[derive(Debug, Clone, Serialize)]
pub struct Navigator {
    stack: Vec<Address>,
}

impl Navigator {
    pub fn new(start: Address) -> Self {
        Self { stack: vec![start] }
    }

    pub fn cursor(&self) -> &Address {
        // The stack is never emptied below its first entry.
        &self.stack[self.stack.len() - 1]
    }

    pub fn move_to(&mut self, address: Address) {
        if *self.cursor() != address {
            self.stack.push(address);
        }
    }

    /// Step back to the previous position. Returns false at the start.
    pub fn back(&mut self) -> bool {
        if self.stack.len() > 1 {
            self.stack.pop();
            true
        } else {
            false
        }
    }

    pub fn stack(&self) -> &[Address] {
        &self.stack
    }
}

/// One interactive context: identity, state and navigation.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    pub nav: Navigator,
}

impl Session {
    pub fn new(start: Address) -> Self {
        Self {
            id: SessionId::new(),
            state: SessionState::new(),
            nav: Navigator::new(start),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Address::root())
    }
}
