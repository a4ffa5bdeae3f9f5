//! Model-completion adapter and agent registry handlers.
//!
//! With an agent name (`agent` or `title`) the conversation is kept on an
//! [`AgentHandle`] in the session, so later steps and lines continue it.
//! Without one the call is a single stateless exchange.

use crate::args::{required_str, str_arg, text_arg};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};
use treeshell_config::ProviderConfig;
use treeshell_core::{
    AgentHandle, CompletionRequest, ExecutionError, Handler, HandlerContext, Message,
    Provider, ProviderError,
};

/// Model and sampling settings applied to every completion.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl From<&ProviderConfig> for CompletionSettings {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

pub struct CompletionHandler {
    provider: Option<Arc<dyn Provider>>,
    settings: CompletionSettings,
}

impl CompletionHandler {
    pub fn new(provider: Option<Arc<dyn Provider>>, settings: CompletionSettings) -> Self {
        Self { provider, settings }
    }
}

#[async_trait]
impl Handler for CompletionHandler {
    fn id(&self) -> &str {
        "model_completion"
    }

    fn description(&self) -> &str {
        "Send a message to the model, optionally as a named agent with memory"
    }

    async fn invoke(
        &self,
        args: Value,
        cx: &mut HandlerContext<'_>,
    ) -> Result<Value, ExecutionError> {
        let message = text_arg(&args, &["message", "prompt"]).ok_or_else(|| {
            ExecutionError::InvalidArguments("'message' or 'prompt' is required".into())
        })?;
        let agent_name = str_arg(&args, &["agent", "title"]).map(str::to_string);
        let system_prompt = str_arg(&args, &["system_prompt"]).map(str::to_string);

        let provider = self.provider.as_ref().ok_or_else(|| {
            ProviderError::NotConfigured("no API key for model completion".into())
        })?;

        let session_id = cx.session_id;
        // Work on a copy; the registry only changes once the model has replied.
        let mut agent = agent_name.as_deref().map(|name| {
            cx.agents.get(name).cloned().unwrap_or_else(|| {
                let agent = AgentHandle::new(name, self.settings.model.clone());
                match &system_prompt {
                    Some(prompt) => agent.with_system_prompt(prompt.clone()),
                    None => agent,
                }
            })
        });

        let mut messages = Vec::new();
        let model = match &agent {
            Some(agent) => {
                if let Some(prompt) = &agent.system_prompt {
                    messages.push(Message::system(prompt.clone()));
                }
                messages.extend(agent.history.iter().cloned());
                agent.model.clone()
            }
            None => {
                if let Some(prompt) = &system_prompt {
                    messages.push(Message::system(prompt.clone()));
                }
                self.settings.model.clone()
            }
        };

        let user = Message::user(message);
        messages.push(user.clone());

        debug!(
            session = %session_id,
            provider = provider.name(),
            agent = agent_name.as_deref().unwrap_or("-"),
            messages = messages.len(),
            "Requesting completion"
        );

        let response = provider
            .complete(CompletionRequest {
                model,
                messages,
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
            })
            .await?;

        let reply = response.message.content.clone();
        if let Some(mut agent) = agent.take() {
            agent.push(user);
            agent.push(response.message);
            if cx.agents.insert(agent).is_none() {
                info!(
                    session = %session_id,
                    agent = agent_name.as_deref().unwrap_or("-"),
                    "Created agent"
                );
            }
        }

        Ok(Value::String(reply))
    }
}

/// Names, models and turn counts of the session's agents.
pub struct ListAgentsHandler;

#[async_trait]
impl Handler for ListAgentsHandler {
    fn id(&self) -> &str {
        "list_agents"
    }

    fn description(&self) -> &str {
        "List agents alive in this session"
    }

    async fn invoke(
        &self,
        _args: Value,
        cx: &mut HandlerContext<'_>,
    ) -> Result<Value, ExecutionError> {
        let agents: Vec<Value> = cx
            .agents
            .iter()
            .map(|a| {
                json!({
                    "name": a.name,
                    "model": a.model,
                    "turns": a.turns(),
                    "last_used": a.last_used,
                })
            })
            .collect();
        Ok(json!({ "count": agents.len(), "agents": agents }))
    }
}

pub struct EvictAgentHandler;

#[async_trait]
impl Handler for EvictAgentHandler {
    fn id(&self) -> &str {
        "evict_agent"
    }

    fn description(&self) -> &str {
        "Forget an agent and its conversation"
    }

    async fn invoke(
        &self,
        args: Value,
        cx: &mut HandlerContext<'_>,
    ) -> Result<Value, ExecutionError> {
        let name = required_str(&args, &["name", "agent", "title"])?;
        match cx.agents.evict(name) {
            Some(agent) => {
                info!(session = %cx.session_id, agent = name, "Evicted agent");
                Ok(json!({ "evicted": true, "agent": name, "turns": agent.turns() }))
            }
            None => Err(ExecutionError::Failed {
                handler: "evict_agent".into(),
                reason: format!("agent '{name}' not found"),
            }),
        }
    }
}
