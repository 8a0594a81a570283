//! Shared types, error model, and configuration for Offer Copilot.
//!
//! This crate is the foundation depended on by all other Offer Copilot crates.
//! It provides:
//! - The unified error type ([`OfferCopilotError`])
//! - Domain types ([`PipelineConfig`], [`ToolDefinition`], [`ToolExecution`], [`AiProvider`],
//!   [`Client`], [`Agent`], [`UserProfile`])
//! - Configuration ([`AppConfig`], config loading)
//! - The [`SettingsSource`] collaborator trait

pub mod config;
pub mod error;
pub mod settings;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CompanyKeysConfig, DefaultsConfig, EndpointsConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{OfferCopilotError, Result};
pub use settings::{SettingsSource, StaticSettings};
pub use types::{
    AdminSettings, Agent, AiProvider, Client, DEFAULT_AGENT_TEMPERATURE, DashboardStats,
    InputKind, InputValues, OutputType, PipelineConfig, Theme, ToolDefinition, ToolExecution,
    ToolInput, ToolUsage, UserProfile,
};
