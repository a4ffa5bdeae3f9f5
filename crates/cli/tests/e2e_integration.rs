//! End-to-end integration tests for TreeShell.
//!
//! These run full lines through the real parser, engine, handlers and tools,
//! with a scripted provider standing in for the model.

use std::io::Write;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use treeshell_config::{AppConfig, ShellConfig};
use treeshell_core::error::{ExecutionError, ProviderError};
use treeshell_core::provider::{CompletionRequest, CompletionResponse, Provider, Usage};
use treeshell_core::{
    Address, AddressSpace, Engine, Handler, HandlerContext, HandlerRegistry, Message, Node,
    Response, StepErrorKind, TreeShell,
};
use treeshell_handlers::{CompletionSettings, default_registry};

// ── Mock Provider ────────────────────────────────────────────────────────

/// Replies `echo: <last user message>` and records every request.
#[derive(Default)]
struct ScriptedProvider {
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_user_message(&self) -> String {
        let requests = self.requests.lock().unwrap();
        let last = requests.last().expect("no requests");
        last.messages.last().unwrap().content.clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let reply = format!("echo: {}", request.messages.last().unwrap().content);
        self.requests.lock().unwrap().push(request);
        Ok(CompletionResponse {
            message: Message::assistant(reply),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock".into(),
        })
    }
}

/// Returns its arguments unchanged.
struct EchoHandler;

#[async_trait::async_trait]
impl Handler for EchoHandler {
    fn id(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Returns its arguments"
    }
    async fn invoke(&self, args: Value, _cx: &mut HandlerContext<'_>) -> Result<Value, ExecutionError> {
        Ok(args)
    }
}

fn settings() -> CompletionSettings {
    CompletionSettings {
        model: "mock-model".into(),
        temperature: 0.0,
        max_tokens: None,
    }
}

/// The built-in catalog wired to real tools and the scripted provider.
fn default_shell(config: &AppConfig, provider: Arc<ScriptedProvider>) -> TreeShell {
    let space = config.tree.build_space().unwrap();
    let tools = Arc::new(treeshell_tools::default_registry(&config.shell));
    let handlers = default_registry(tools, Some(provider as Arc<dyn Provider>), settings());
    TreeShell::new(Engine::new(Arc::new(space), Arc::new(handlers)).with_options(config.engine))
}

fn outcome(response: Response) -> treeshell_core::ChainOutcome {
    match response {
        Response::Outcome(outcome) => outcome,
        other => panic!("expected an outcome, got {other:?}"),
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_single_jump_to_registered_handler() {
    let provider = Arc::new(ScriptedProvider::default());
    let mut shell = default_shell(&AppConfig::default(), provider.clone());

    let out = outcome(shell.handle(r#"jump 0.1.1 {"title":"t","message":"hi"}"#).await);

    assert!(out.success);
    assert_eq!(out.steps.len(), 1);
    assert_eq!(out.steps[0].output, json!("echo: hi"));
    assert_eq!(out.cursor, "0.1.1".parse::<Address>().unwrap());
    assert_eq!(provider.calls(), 1);
    assert_eq!(shell.session().state.agents.names(), vec!["t"]);
}

#[tokio::test]
async fn scenario_b_bash_chain_threads_output() {
    let provider = Arc::new(ScriptedProvider::default());
    let mut shell = default_shell(&AppConfig::default(), provider);

    let line = r#"jump 0.5.1 {"tool_name":"bash_tool","parameters":{"command":"echo step1"}} -> jump 0.5.1 {"tool_name":"bash_tool","parameters":{"command":"echo $step1_result"}}"#;
    let out = outcome(shell.handle(line).await);

    assert!(out.success, "chain failed: {:?}", out.steps);
    assert_eq!(out.steps.len(), 2);
    assert_eq!(out.steps[0].output, json!("step1"));
    assert_eq!(out.steps[1].args["parameters"]["command"], json!("echo step1"));
    assert_eq!(out.steps[1].output, json!("step1"));
    // chains do not move the cursor
    assert_eq!(out.cursor, Address::root());
}

#[tokio::test]
async fn scenario_c_missing_address() {
    let provider = Arc::new(ScriptedProvider::default());
    let mut shell = default_shell(&AppConfig::default(), provider);

    let out = outcome(shell.handle("jump 9.9.9").await);

    assert!(!out.success);
    assert_eq!(out.steps.len(), 1);
    assert_eq!(out.steps[0].error_kind, Some(StepErrorKind::AddressNotFound));
    assert!(out.steps[0].error.as_deref().unwrap().contains("9.9.9"));
}

#[tokio::test]
async fn scenario_d_reference_to_future_step() {
    let space = AddressSpace::builder()
        .node(Node::menu("0".parse().unwrap(), "Root"))
        .unwrap()
        .node(Node::menu("0.1".parse().unwrap(), "Echoes"))
        .unwrap()
        .node(Node::action("0.1.1".parse().unwrap(), "First", "echo"))
        .unwrap()
        .node(Node::action("0.1.2".parse().unwrap(), "Second", "echo"))
        .unwrap()
        .build();
    let mut handlers = HandlerRegistry::new();
    handlers.register(Arc::new(EchoHandler));
    let mut shell = TreeShell::new(Engine::new(Arc::new(space), Arc::new(handlers)));

    let out = outcome(shell.handle(r#"jump 0.1.1 -> jump 0.1.2 {"x":"$step5_result"}"#).await);

    assert!(!out.success);
    assert_eq!(out.steps.len(), 2);
    assert!(out.steps[0].success);
    assert!(!out.steps[1].success);
    assert_eq!(out.steps[1].error_kind, Some(StepErrorKind::UnknownStep));
    // the unresolved payload is kept for inspection
    assert_eq!(out.steps[1].args, json!({"x": "$step5_result"}));
}

// ── Cross-handler flows ──────────────────────────────────────────────────

#[tokio::test]
async fn e2e_tool_output_feeds_named_agent() {
    let provider = Arc::new(ScriptedProvider::default());
    let mut shell = default_shell(&AppConfig::default(), provider.clone());

    let line = r#"jump 0.5.1 {"tool_name":"bash_tool","parameters":{"command":"echo 42"}} -> jump 0.1.1 {"title":"analyst","message":"explain $last_result"} -> jump 0.1.2 {"agent":"analyst","message":"and again"}"#;
    let out = outcome(shell.handle(line).await);

    assert!(out.success, "chain failed: {:?}", out.steps);
    assert_eq!(out.steps[1].output, json!("echo: explain 42"));
    assert_eq!(provider.last_user_message(), "and again");

    let requests = provider.requests.lock().unwrap();
    // second completion carried the first exchange as history
    assert_eq!(requests[1].messages.len(), 3);
    assert_eq!(shell.session().state.agents.get("analyst").unwrap().turns(), 2);
}

#[tokio::test]
async fn e2e_session_variables_across_lines() {
    let provider = Arc::new(ScriptedProvider::default());
    let mut shell = default_shell(&AppConfig::default(), provider);

    let out = outcome(
        shell
            .handle(r#"jump 0.2.1 {"name":"greeting","value":"hello"} -> jump 0.2.3 {"name":"greeting","value":" world"}"#)
            .await,
    );
    assert!(out.success);

    let out = outcome(shell.handle(r#"jump 0.2.2 {"name":"greeting"}"#).await);
    assert_eq!(out.steps[0].output, json!("hello world"));
    assert_eq!(out.steps[0].index, 3);

    let out = outcome(shell.handle("jump 0.2.6").await);
    assert_eq!(out.steps[0].output["results"], json!(3));
    assert_eq!(out.steps[0].output["variables"], json!(1));
}

#[tokio::test]
async fn e2e_menu_navigation_with_shortcuts() {
    let provider = Arc::new(ScriptedProvider::default());
    let mut shell = default_shell(&AppConfig::default(), provider);

    let out = outcome(shell.handle("5").await);
    assert!(out.success);
    assert_eq!(out.steps[0].output["label"], json!("Tools"));

    let out = outcome(
        shell
            .handle(r#"1 {"tool_name":"bash_tool","parameters":{"command":"echo relative"}}"#)
            .await,
    );
    assert_eq!(out.steps[0].address, "0.5.1".parse::<Address>().unwrap());
    assert_eq!(out.steps[0].output, json!("relative"));

    let Response::Menu(menu) = shell.handle("back").await else {
        panic!("expected menu");
    };
    assert_eq!(menu.label, "Tools");

    let Response::History(history) = shell.handle("history").await else {
        panic!("expected history");
    };
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn e2e_failed_tool_aborts_chain() {
    let config = AppConfig {
        shell: ShellConfig {
            allowed_commands: vec!["echo".into()],
            timeout_secs: 5,
        },
        ..AppConfig::default()
    };
    let provider = Arc::new(ScriptedProvider::default());
    let mut shell = default_shell(&config, provider.clone());

    let line = r#"jump 0.5.1 {"tool_name":"bash_tool","parameters":{"command":"rm -rf /tmp/x"}} -> jump 0.1.1 {"message":"$step1_result"}"#;
    let out = outcome(shell.handle(line).await);

    assert!(!out.success);
    assert_eq!(out.steps.len(), 1);
    assert_eq!(out.steps[0].error_kind, Some(StepErrorKind::Execution));
    assert!(out.steps[0].error.as_deref().unwrap().contains("allowlist"));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn e2e_continue_on_error_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[engine]
continue_on_error = true

[shell]
timeout_secs = 5
"#
    )
    .unwrap();
    let config = AppConfig::load_from(file.path()).unwrap();
    let provider = Arc::new(ScriptedProvider::default());
    let mut shell = default_shell(&config, provider);

    let line = r#"jump 0.5.1 {"tool_name":"bash_tool","parameters":{"command":"exit 2"}} -> jump 0.2.1 {"name":"after","value":"$step1_result"} -> jump 0.2.5"#;
    let out = outcome(shell.handle(line).await);

    assert!(!out.success);
    assert_eq!(out.steps.len(), 3);
    assert_eq!(out.steps[1].error_kind, Some(StepErrorKind::FailedStep));
    assert!(out.steps[2].success);
    assert_eq!(out.steps[2].output["count"], json!(0));
}

#[tokio::test]
async fn e2e_literal_dollar_text_is_untouched() {
    let provider = Arc::new(ScriptedProvider::default());
    let mut shell = default_shell(&AppConfig::default(), provider);

    let line = r#"jump 0.2.1 {"name":"note","value":"costs $$step1_result and $HOME"}"#;
    let out = outcome(shell.handle(line).await);

    assert!(out.success);
    assert_eq!(out.steps[0].output["value"], json!("costs $step1_result and $HOME"));
}

#[tokio::test]
async fn e2e_rejected_line_records_nothing() {
    let provider = Arc::new(ScriptedProvider::default());
    let mut shell = default_shell(&AppConfig::default(), provider);

    let response = shell
        .handle(r#"jump 0.2.1 {"name":"a"} -> jump 0.2.2 {"name":"#)
        .await;
    assert!(matches!(response, Response::Rejected(_)));
    assert!(shell.session().state.is_empty());
}

#[tokio::test]
async fn e2e_model_completion_without_provider() {
    let config = AppConfig::default();
    let space = config.tree.build_space().unwrap();
    let tools = Arc::new(treeshell_tools::default_registry(&config.shell));
    let handlers = default_registry(tools, None, settings());
    let mut shell = TreeShell::new(Engine::new(Arc::new(space), Arc::new(handlers)));

    let out = outcome(shell.handle(r#"jump 0.1.1 {"message":"hi"}"#).await);
    assert!(!out.success);
    assert!(out.steps[0].error.as_deref().unwrap().contains("not configured"));
}
