//! # TreeShell Core
//!
//! Address space, command parser, argument resolver, session state and the
//! chained execution engine for TreeShell.
//!
//! A TreeShell exposes a fixed tree of numbered nodes (`0`, `0.1`, `0.1.2`).
//! Users navigate it and execute single nodes or chains of nodes in one line:
//!
//! ```text
//! jump 0.5.1 {"tool_name":"bash_tool","parameters":{"command":"echo hi"}}
//!   -> jump 0.1.1 {"message":"summarize: $step1_result"}
//! ```
//!
//! Each step's output is recorded in the session and can be referenced by
//! later steps with `$stepN_result` or `$last_result`.
//!
//! Handlers, tools and providers are traits here. Implementations live in
//! their respective crates, which all depend inward on this one.

pub mod address;
pub mod command;
pub mod engine;
pub mod error;
pub mod handler;
pub mod message;
pub mod provider;
pub mod resolver;
pub mod session;
pub mod shell;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use address::{Address, AddressSpace, AddressSpaceBuilder, ArgType, Menu, MenuOption, Node};
pub use command::{ChainStep, Command, Target, parse_line};
pub use engine::{CancelHandle, CancelSignal, ChainOutcome, Engine, EngineOptions};
pub use error::{
    AddressError, ExecutionError, ParseError, ProviderError, StepError, StepErrorKind,
    SubstitutionError, ToolError,
};
pub use handler::{Handler, HandlerContext, HandlerRegistry};
pub use message::{Message, Role};
pub use provider::{CompletionRequest, CompletionResponse, Provider, Usage};
pub use resolver::ArgTemplate;
pub use session::{
    AgentHandle, AgentRegistry, Navigator, Session, SessionId, SessionState, StepResult,
};
pub use shell::{Response, TreeShell};
pub use tool::{Tool, ToolDefinition, ToolRegistry, ToolResult};
