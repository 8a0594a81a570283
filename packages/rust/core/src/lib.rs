//! Core domain logic for Offer Copilot.
//!
//! - [`registry`]: the built-in tools and tool CRUD
//! - [`runner`]: validating, enriching, and executing a tool run
//! - [`copilot`]: the multi-turn Copilot chat assistant
//! - [`clients`], [`agents`]: client and agent records
//! - [`stats`]: dashboard aggregates over the execution history

pub mod agents;
pub mod clients;
pub mod copilot;
pub mod registry;
pub mod runner;
pub mod stats;

pub use agents::{AgentRegistry, AgentUpdate, NewAgent};
pub use clients::{ClientRegistry, ClientUpdate, NewClient, parse_objectives};
pub use copilot::{COPILOT_GREETING, COPILOT_SYSTEM_PROMPT, CopilotChat, CopilotTurn};
pub use registry::{NewTool, ToolRegistry, ToolUpdate, default_tools};
pub use runner::{ToolRunner, build_research_query, validate_inputs};
pub use stats::dashboard_stats;
