//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use offercopilot_core::{
    AgentRegistry, AgentUpdate, COPILOT_GREETING, ClientRegistry, ClientUpdate, CopilotChat,
    NewAgent, NewClient, NewTool, ToolRegistry, ToolRunner, dashboard_stats, parse_objectives,
};
use offercopilot_providers::{AiClient, ProviderEndpoints};
use offercopilot_research::{ContextAggregator, ResearchEndpoints, test_pipeline};
use offercopilot_shared::{
    AdminSettings, Agent, AiProvider, AppConfig, Client, InputValues, OfferCopilotError,
    OutputType, PipelineConfig, ToolDefinition, UserProfile, init_config, load_config,
};
use offercopilot_storage::{Storage, StoredSettings};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Offer Copilot: AI copywriting tools with research-backed context.
#[derive(Parser)]
#[command(
    name = "offercopilot",
    version,
    about = "Run copywriting tools against Groq, DeepSeek, or Gemini, with optional research context.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum Switch {
    On,
    Off,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Gather research context for a query from the enabled sources.
    Context {
        /// Research subject (words are joined with spaces).
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Also print a per-source status table.
        #[arg(long)]
        report: bool,
    },

    /// Browse, run, and manage tools.
    Tools {
        #[command(subcommand)]
        action: ToolsAction,
    },

    /// Research pipeline settings.
    Pipeline {
        #[command(subcommand)]
        action: PipelineAction,
    },

    /// Chat with the Copilot assistant.
    Copilot {
        /// Message to send; omit it for an interactive session.
        message: Vec<String>,

        /// Attach a file; its name is shared with the assistant (repeatable).
        #[arg(short, long = "attach", value_name = "PATH")]
        attach: Vec<PathBuf>,
    },

    /// Manage clients.
    Clients {
        #[command(subcommand)]
        action: ClientsAction,
    },

    /// Manage agent presets.
    Agents {
        #[command(subcommand)]
        action: AgentsAction,
    },

    /// Show or edit your user profile.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Personal and company API keys.
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Admin mode and admin settings.
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },

    /// Show usage statistics.
    Stats,

    /// Show recent tool runs.
    History {
        /// Number of runs to show.
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum ToolsAction {
    /// List tools, optionally filtered by category.
    List {
        #[arg(short, long)]
        category: Option<String>,
    },
    /// List tool categories.
    Categories,
    /// Show a tool's prompt and inputs.
    Show { id: String },
    /// Run a tool.
    Run {
        id: String,

        /// Input value as `key=value` (repeatable).
        #[arg(short, long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,

        /// Print the full execution record as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Add a tool from a JSON file (admin mode only).
    Add {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Remove a tool (admin mode only).
    Remove { id: String },
}

/// Optional client fields shared by `add` and `edit`.
#[derive(Args)]
pub(crate) struct ClientFields {
    #[arg(long)]
    segment: Option<String>,
    #[arg(long)]
    persona: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    voice_tone: Option<String>,
    /// Comma-separated objectives.
    #[arg(long)]
    objectives: Option<String>,
}

#[derive(Subcommand)]
pub(crate) enum ClientsAction {
    /// List clients.
    List,
    /// Show one client.
    Show { id: String },
    /// Add a client.
    Add {
        name: String,
        #[command(flatten)]
        fields: ClientFields,
    },
    /// Change a client's fields.
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: ClientFields,
    },
    /// Remove a client.
    Remove { id: String },
}

/// Optional agent fields shared by `add` and `edit`.
#[derive(Args)]
pub(crate) struct AgentFields {
    #[arg(long)]
    model: Option<String>,
    /// Sampling temperature, 0 to 2.
    #[arg(long)]
    temperature: Option<f32>,
    /// Base prompt.
    #[arg(long)]
    prompt: Option<String>,
}

#[derive(Subcommand)]
pub(crate) enum AgentsAction {
    /// List agents.
    List,
    /// Show one agent.
    Show { id: String },
    /// Add an agent.
    Add {
        name: String,
        #[command(flatten)]
        fields: AgentFields,
    },
    /// Change an agent's fields.
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: AgentFields,
    },
    /// Remove an agent.
    Remove { id: String },
}

#[derive(Subcommand)]
pub(crate) enum ProfileAction {
    /// Show the stored profile.
    Show,
    /// Change profile fields; the result is validated before saving.
    Set {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        /// Avatar image URL; pass an empty string to remove it.
        #[arg(long)]
        avatar: Option<String>,
        #[arg(long)]
        timezone: Option<String>,
        #[arg(long)]
        language: Option<String>,
        /// Instagram handle; pass an empty string to remove it.
        #[arg(long)]
        instagram: Option<String>,
    },
}

#[derive(Subcommand)]
pub(crate) enum PipelineAction {
    /// Show the stored pipeline config.
    Show,
    /// Change which sources are enabled.
    Set {
        #[arg(long)]
        deepseek: Option<bool>,
        #[arg(long)]
        tavily: Option<bool>,
        #[arg(long)]
        jina: Option<bool>,
        /// Tavily search key; pass an empty string to clear it.
        #[arg(long)]
        tavily_key: Option<String>,
    },
    /// Run the pipeline once with a sample query.
    Test,
}

#[derive(Subcommand)]
pub(crate) enum KeysAction {
    /// Store your own key for a provider.
    Set { provider: AiProvider, key: String },
    /// Remove your stored key for a provider.
    Remove { provider: AiProvider },
    /// Show which keys are configured (masked).
    List,
    /// Prefer company keys (on) or always use your own (off).
    Company { mode: Switch },
}

#[derive(Subcommand)]
pub(crate) enum AdminAction {
    /// Show whether admin mode is on.
    Status,
    /// Flip admin mode.
    Toggle,
    /// Show or change the default provider and model.
    Settings {
        #[arg(long)]
        provider: Option<AiProvider>,
        #[arg(long)]
        model: Option<String>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so command
/// output stays pipeable.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "offercopilot=info",
        1 => "offercopilot=debug",
        _ => "offercopilot=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
        command => {
            let app = App::open().await?;
            match command {
                Command::Context { query, report } => cmd_context(&app, &query.join(" "), report).await,
                Command::Tools { action } => cmd_tools(&app, action).await,
                Command::Pipeline { action } => cmd_pipeline(&app, action).await,
                Command::Copilot { message, attach } => {
                    cmd_copilot(&app, &message.join(" "), &attach).await
                }
                Command::Clients { action } => cmd_clients(&app, action).await,
                Command::Agents { action } => cmd_agents(&app, action).await,
                Command::Profile { action } => cmd_profile(&app, action).await,
                Command::Keys { action } => cmd_keys(&app, action).await,
                Command::Admin { action } => cmd_admin(&app, action).await,
                Command::Stats => cmd_stats(&app).await,
                Command::History { limit } => cmd_history(&app, limit).await,
                // Handled before opening storage.
                Command::Config { .. } => Ok(()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Application wiring
// ---------------------------------------------------------------------------

/// Everything a command needs: config, database, key resolution, HTTP client.
struct App {
    config: AppConfig,
    storage: Arc<Storage>,
    settings: StoredSettings,
    ai: AiClient,
}

impl App {
    async fn open() -> Result<Self> {
        let config = load_config()?;
        let db_path = config.db_path()?;
        let storage = Arc::new(Storage::open(&db_path).await?);
        let settings = StoredSettings::new(storage.clone(), config.company_keys.clone());
        let ai = AiClient::new(ProviderEndpoints::from(&config.endpoints))?
            .with_temperature(config.defaults.temperature);

        info!(db = %db_path.display(), "storage ready");
        Ok(Self {
            config,
            storage,
            settings,
            ai,
        })
    }

    fn aggregator(&self) -> ContextAggregator<'_> {
        ContextAggregator::new(
            &self.settings,
            &self.ai,
            ResearchEndpoints::from(&self.config.endpoints),
        )
    }

    fn runner(&self) -> ToolRunner<'_> {
        ToolRunner::new(
            &self.storage,
            &self.settings,
            &self.ai,
            ResearchEndpoints::from(&self.config.endpoints),
        )
        .with_fallback(self.config.defaults.provider, self.config.defaults.model.clone())
    }

    fn registry(&self) -> ToolRegistry<'_> {
        ToolRegistry::new(&self.storage)
    }

    fn copilot(&self) -> CopilotChat<'_> {
        CopilotChat::new(&self.storage, &self.settings, &self.ai)
            .with_fallback(self.config.defaults.provider, self.config.defaults.model.clone())
    }

    async fn require_admin(&self) -> Result<()> {
        if !self.storage.is_admin().await? {
            return Err(eyre!(
                "this command requires admin mode (enable it with `offercopilot admin toggle`)"
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

async fn cmd_context(app: &App, query: &str, with_report: bool) -> Result<()> {
    info!(query, "gathering research context");

    let progress = CliProgress::new("Researching...");
    let report = app.aggregator().collect(query).await;
    progress.finish();

    if with_report {
        println!();
        for result in &report.results {
            match result.error_message() {
                None => println!("  ok    {}", result.provider_label()),
                Some(error) => println!("  fail  {}: {error}", result.provider_label()),
            }
        }
        println!();
    }

    let combined = report.combined();
    if combined.is_empty() {
        eprintln!("No source contributed context. Check `offercopilot pipeline show` and your keys.");
    } else {
        println!("{combined}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

async fn cmd_tools(app: &App, action: ToolsAction) -> Result<()> {
    let registry = app.registry();
    registry.initialize().await?;

    match action {
        ToolsAction::List { category } => {
            let tools = match category.as_deref() {
                Some(c) => registry.by_category(c).await?,
                None => registry.all().await?,
            };
            if tools.is_empty() {
                println!("No tools found.");
                return Ok(());
            }
            for tool in &tools {
                let research = if tool.research_context { " [research]" } else { "" };
                println!(
                    "  {:<10} {:<24} {:<14} {}{research}",
                    tool.id,
                    tool.name,
                    tool.category.as_deref().unwrap_or("-"),
                    tool.description,
                );
            }
        }
        ToolsAction::Categories => {
            for category in registry.categories().await? {
                println!("  {category}");
            }
        }
        ToolsAction::Show { id } => print_tool(&registry.get(&id).await?),
        ToolsAction::Run { id, inputs, json } => {
            let tool = registry.get(&id).await?;
            let inputs = parse_inputs(&inputs)?;

            let message = if tool.research_context {
                format!("Researching and running {}...", tool.name)
            } else {
                format!("Running {}...", tool.name)
            };
            let progress = CliProgress::new(&message);
            let result = app.runner().run(&tool, inputs).await;
            progress.finish();
            let execution = result?;

            if json {
                println!("{}", serde_json::to_string_pretty(&execution)?);
            } else {
                println!("{}", render_output(tool.output_type, &execution.output));
                eprintln!();
                eprintln!(
                    "  {} / {} / {} tokens",
                    execution.provider,
                    execution.model,
                    execution
                        .tokens
                        .map_or_else(|| "?".to_string(), |t| t.to_string()),
                );
            }
        }
        ToolsAction::Add { file } => {
            app.require_admin().await?;
            let tool = registry.create(read_new_tool(&file)?).await?;
            println!("Added tool '{}' ({}).", tool.id, tool.name);
        }
        ToolsAction::Remove { id } => {
            app.require_admin().await?;
            registry.delete(&id).await?;
            println!("Removed tool '{id}'.");
        }
    }
    Ok(())
}

fn print_tool(tool: &ToolDefinition) {
    println!();
    println!("  {} ({})", tool.name, tool.id);
    println!("  {}", tool.description);
    println!("  Category: {}", tool.category.as_deref().unwrap_or("-"));
    println!("  Output:   {:?}", tool.output_type);
    println!("  Research: {}", if tool.research_context { "yes" } else { "no" });
    println!();
    println!("  Prompt:");
    println!("    {}", tool.prompt);
    println!();
    println!("  Inputs:");
    for input in &tool.inputs {
        let required = if input.required { "*" } else { " " };
        let mut line = format!("   {required} {:<10} {:<22} {:?}", input.id, input.label, input.kind);
        if !input.options.is_empty() {
            line.push_str(&format!(" [{}]", input.options.join(" | ")));
        }
        if let Some(placeholder) = &input.placeholder {
            line.push_str(&format!("  ({placeholder})"));
        }
        println!("{line}");
    }
    println!();
}

/// Parse repeated `key=value` arguments, preserving order.
fn parse_inputs(raw: &[String]) -> Result<InputValues> {
    raw.iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .ok_or_else(|| eyre!("invalid input '{pair}': expected key=value"))
        })
        .collect()
}

fn read_new_tool(path: &Path) -> Result<NewTool> {
    let text = std::fs::read_to_string(path).map_err(|e| OfferCopilotError::io(path, e))?;
    let tool = serde_json::from_str(&text)
        .map_err(|e| OfferCopilotError::parse(format!("invalid tool file {}: {e}", path.display())))?;
    Ok(tool)
}

/// Pretty-print JSON outputs when they parse; everything else verbatim.
fn render_output(output_type: OutputType, output: &str) -> String {
    if output_type == OutputType::Json {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(output) {
            if let Ok(pretty) = serde_json::to_string_pretty(&value) {
                return pretty;
            }
        }
    }
    output.to_string()
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

async fn cmd_pipeline(app: &App, action: PipelineAction) -> Result<()> {
    match action {
        PipelineAction::Show => {
            let stored = app.storage.pipeline_config().await?;
            if stored.is_none() {
                println!("  (no saved config, showing defaults)");
            }
            print_pipeline(&stored.unwrap_or_default());
        }
        PipelineAction::Set {
            deepseek,
            tavily,
            jina,
            tavily_key,
        } => {
            let mut config = app.storage.pipeline_config().await?.unwrap_or_default();
            if let Some(v) = deepseek {
                config.enable_deepseek = v;
            }
            if let Some(v) = tavily {
                config.enable_tavily = v;
            }
            if let Some(v) = jina {
                config.enable_jina = v;
            }
            if let Some(key) = tavily_key {
                let key = key.trim().to_string();
                config.tavily_search_key = (!key.is_empty()).then_some(key);
            }
            app.storage.save_pipeline_config(&config).await?;
            info!("pipeline config saved");
            print_pipeline(&config);
            if config.enable_jina && !config.enable_tavily {
                eprintln!("  note: Jina Reader only runs when Tavily is enabled");
            }
        }
        PipelineAction::Test => {
            let progress = CliProgress::new("Testing pipeline...");
            let ok = test_pipeline(&app.aggregator()).await;
            progress.finish();
            if ok {
                println!("Pipeline OK: at least one source returned context.");
            } else {
                return Err(eyre!("pipeline test returned no context"));
            }
        }
    }
    Ok(())
}

fn print_pipeline(config: &PipelineConfig) {
    let flag = |on: bool| if on { "on" } else { "off" };
    println!("  DeepSeek AI:   {}", flag(config.enable_deepseek));
    println!("  Tavily Search: {}", flag(config.enable_tavily));
    println!("  Jina Reader:   {}", flag(config.enable_jina));
    println!(
        "  Tavily key:    {}",
        config.search_key().map_or_else(|| "(not set)".to_string(), mask)
    );
}

// ---------------------------------------------------------------------------
// Copilot
// ---------------------------------------------------------------------------

async fn cmd_copilot(app: &App, message: &str, attach: &[PathBuf]) -> Result<()> {
    let mut files = attachment_names(attach)?;
    let mut chat = app.copilot();

    if !message.trim().is_empty() {
        let progress = CliProgress::new("Thinking...");
        let reply = chat.send(message.trim(), &files).await;
        progress.finish();
        println!("{}", reply?);
        return Ok(());
    }

    println!("{COPILOT_GREETING}");
    eprintln!("(/limpar clears the conversation, /sair or Ctrl-D leaves)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/sair" | "/exit" => break,
            "/limpar" | "/clear" => {
                chat.clear();
                println!("{COPILOT_GREETING}");
            }
            text => {
                let progress = CliProgress::new("Thinking...");
                let reply = chat.send(text, &std::mem::take(&mut files)).await;
                progress.finish();
                match reply {
                    Ok(reply) => println!("{reply}\n"),
                    Err(e) => eprintln!("Erro: {e}\n"),
                }
            }
        }
    }
    Ok(())
}

/// File names of the attachments, which must exist.
fn attachment_names(paths: &[PathBuf]) -> Result<Vec<String>> {
    paths
        .iter()
        .map(|path| {
            if !path.is_file() {
                return Err(eyre!("attachment not found: {}", path.display()));
            }
            Ok(path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Clients and agents
// ---------------------------------------------------------------------------

async fn cmd_clients(app: &App, action: ClientsAction) -> Result<()> {
    let registry = ClientRegistry::new(&app.storage);

    match action {
        ClientsAction::List => {
            let clients = registry.all().await?;
            if clients.is_empty() {
                println!("No clients yet.");
            }
            for client in &clients {
                println!(
                    "  {}  {:<24} {}",
                    client.id,
                    client.name,
                    if client.segment.is_empty() { "-" } else { client.segment.as_str() },
                );
            }
        }
        ClientsAction::Show { id } => print_client(&registry.get(&id).await?),
        ClientsAction::Add { name, fields } => {
            let client = registry
                .create(NewClient {
                    name,
                    segment: fields.segment.unwrap_or_default(),
                    persona: fields.persona.unwrap_or_default(),
                    notes: fields.notes.unwrap_or_default(),
                    voice_tone: fields.voice_tone.unwrap_or_default(),
                    objectives: fields.objectives.as_deref().map(parse_objectives).unwrap_or_default(),
                })
                .await?;
            println!("Added client '{}' ({}).", client.name, client.id);
        }
        ClientsAction::Edit { id, name, fields } => {
            let client = registry
                .update(
                    &id,
                    ClientUpdate {
                        name,
                        segment: fields.segment,
                        persona: fields.persona,
                        notes: fields.notes,
                        voice_tone: fields.voice_tone,
                        objectives: fields.objectives.as_deref().map(parse_objectives),
                    },
                )
                .await?;
            print_client(&client);
        }
        ClientsAction::Remove { id } => {
            registry.delete(&id).await?;
            println!("Removed client '{id}'.");
        }
    }
    Ok(())
}

fn print_client(client: &Client) {
    println!();
    println!("  {} ({})", client.name, client.id);
    println!("  Segment:    {}", client.segment);
    println!("  Persona:    {}", client.persona);
    println!("  Voice tone: {}", client.voice_tone);
    println!("  Objectives: {}", client.objectives.join(", "));
    println!("  Notes:      {}", client.notes);
    println!("  Updated:    {}", client.updated_at.format("%Y-%m-%d %H:%M"));
    println!();
}

async fn cmd_agents(app: &App, action: AgentsAction) -> Result<()> {
    let registry = AgentRegistry::new(&app.storage);

    match action {
        AgentsAction::List => {
            let agents = registry.all().await?;
            if agents.is_empty() {
                println!("No agents yet.");
            }
            for agent in &agents {
                println!(
                    "  {}  {:<24} {:<26} {}",
                    agent.id, agent.name, agent.model, agent.temperature
                );
            }
        }
        AgentsAction::Show { id } => print_agent(&registry.get(&id).await?),
        AgentsAction::Add { name, fields } => {
            let agent = registry
                .create(NewAgent {
                    name,
                    model: fields.model,
                    temperature: fields.temperature,
                    prompt_base: fields.prompt.unwrap_or_default(),
                })
                .await?;
            println!("Added agent '{}' ({}).", agent.name, agent.id);
        }
        AgentsAction::Edit { id, name, fields } => {
            let agent = registry
                .update(
                    &id,
                    AgentUpdate {
                        name,
                        model: fields.model,
                        temperature: fields.temperature,
                        prompt_base: fields.prompt,
                    },
                )
                .await?;
            print_agent(&agent);
        }
        AgentsAction::Remove { id } => {
            registry.delete(&id).await?;
            println!("Removed agent '{id}'.");
        }
    }
    Ok(())
}

fn print_agent(agent: &Agent) {
    println!();
    println!("  {} ({})", agent.name, agent.id);
    println!("  Model:       {}", agent.model);
    println!("  Temperature: {}", agent.temperature);
    println!();
    println!("  Prompt:");
    println!("    {}", agent.prompt_base);
    println!();
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

async fn cmd_profile(app: &App, action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::Show => print_profile(&app.storage.user_profile().await?),
        ProfileAction::Set {
            email,
            name,
            bio,
            avatar,
            timezone,
            language,
            instagram,
        } => {
            let mut profile = app.storage.user_profile().await?;
            if let Some(email) = email {
                profile.email = email.trim().to_string();
            }
            if let Some(name) = name {
                profile.full_name = name.trim().to_string();
            }
            if let Some(bio) = bio {
                profile.bio = bio;
            }
            if let Some(avatar) = avatar {
                profile.avatar = Some(avatar.trim().to_string()).filter(|a| !a.is_empty());
            }
            if let Some(timezone) = timezone {
                profile.timezone = timezone.trim().to_string();
            }
            if let Some(language) = language {
                profile.language = language.trim().to_string();
            }
            if let Some(handle) = instagram {
                profile.instagram_handle = Some(handle.trim().to_string()).filter(|h| !h.is_empty());
            }

            app.storage.save_user_profile(&profile).await?;
            info!("profile saved");
            print_profile(&profile);
        }
    }
    Ok(())
}

fn print_profile(profile: &UserProfile) {
    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
    println!();
    println!("  [{}] {}", profile.initials(), or_dash(&profile.full_name));
    println!("  Email:     {}", or_dash(&profile.email));
    println!("  Bio:       {}", or_dash(&profile.bio));
    println!("  Timezone:  {}", profile.timezone);
    println!("  Language:  {}", profile.language);
    println!(
        "  Instagram: {}",
        or_dash(profile.instagram_handle.as_deref().unwrap_or_default())
    );
    println!("  Avatar:    {}", or_dash(profile.avatar.as_deref().unwrap_or_default()));
    println!();
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

async fn cmd_keys(app: &App, action: KeysAction) -> Result<()> {
    match action {
        KeysAction::Set { provider, key } => {
            if key.trim().is_empty() {
                return Err(eyre!("key must not be empty"));
            }
            app.storage.set_user_api_key(provider, &key).await?;
            println!("Saved {} key.", provider.display_name());
        }
        KeysAction::Remove { provider } => {
            if app.storage.remove_user_api_key(provider).await? {
                println!("Removed {} key.", provider.display_name());
            } else {
                println!("No {} key was stored.", provider.display_name());
            }
        }
        KeysAction::List => {
            let company_mode = app.storage.use_company_api().await?;
            let user_keys = app.storage.user_api_keys().await?;
            println!(
                "  Mode: {}",
                if company_mode { "company keys first" } else { "personal keys only" }
            );
            println!();
            for provider in AiProvider::ALL {
                let personal = user_keys
                    .get(provider.as_str())
                    .filter(|k| !k.trim().is_empty())
                    .map_or_else(|| "-".to_string(), |k| mask(k));
                let company_env = app.config.company_keys.env_var(provider);
                let company = if app.config.company_keys.key_for(provider).is_some() {
                    format!("${company_env} set")
                } else {
                    format!("${company_env} unset")
                };
                println!("  {:<9} personal: {personal:<14} company: {company}", provider.display_name());
            }
        }
        KeysAction::Company { mode } => {
            let enabled = matches!(mode, Switch::On);
            app.storage.set_use_company_api(enabled).await?;
            println!("Company keys {}.", if enabled { "enabled" } else { "disabled" });
        }
    }
    Ok(())
}

/// Show only the edges of a secret.
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

async fn cmd_admin(app: &App, action: AdminAction) -> Result<()> {
    match action {
        AdminAction::Status => {
            let on = app.storage.is_admin().await?;
            println!("Admin mode is {}.", if on { "on" } else { "off" });
        }
        AdminAction::Toggle => {
            let on = app.storage.toggle_admin().await?;
            println!("Admin mode is now {}.", if on { "on" } else { "off" });
        }
        AdminAction::Settings { provider, model } => {
            let mut settings = match app.storage.admin_settings().await? {
                Some(settings) => settings,
                None => {
                    AdminSettings {
                        default_provider: app.config.defaults.provider,
                        default_model: app.config.defaults.model.clone(),
                        ..Default::default()
                    }
                }
            };

            if provider.is_some() || model.is_some() {
                app.require_admin().await?;
                if let Some(p) = provider {
                    if p != settings.default_provider && model.is_none() {
                        settings.default_model = p.default_model().to_string();
                    }
                    settings.default_provider = p;
                }
                if let Some(m) = model {
                    settings.default_model = m;
                }
                app.storage.save_admin_settings(&settings).await?;
                info!(provider = %settings.default_provider, "admin settings saved");
            }

            println!("  Provider:  {}", settings.default_provider.display_name());
            println!("  Model:     {}", settings.default_model);
            println!("  Theme:     {:?}", settings.theme);
            println!("  Auto-save: {}", settings.auto_save);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Stats and history
// ---------------------------------------------------------------------------

async fn cmd_stats(app: &App) -> Result<()> {
    let tools = app.registry().initialize().await?;
    let stats = dashboard_stats(&app.storage).await?;

    println!();
    println!("  Tools:      {}", tools.len());
    println!("  Executions: {}", stats.total_executions);
    println!("  Tokens:     {}", stats.total_tokens);

    if !stats.top_tools.is_empty() {
        println!();
        println!("  Most used:");
        for usage in &stats.top_tools {
            println!("    {:<24} {}", usage.name, usage.count);
        }
    }

    if !stats.recent_executions.is_empty() {
        println!();
        println!("  Recent:");
        for run in &stats.recent_executions {
            println!(
                "    {}  {:<24} {}",
                run.timestamp.format("%Y-%m-%d %H:%M"),
                run.tool_name,
                run.provider
            );
        }
    }
    println!();
    Ok(())
}

async fn cmd_history(app: &App, limit: u32) -> Result<()> {
    let runs = app.storage.list_executions(limit).await?;
    if runs.is_empty() {
        println!("No tool runs yet.");
        return Ok(());
    }

    for run in &runs {
        println!(
            "  {}  {:<24} {:<9} {:<26} {:>6} tokens",
            run.timestamp.format("%Y-%m-%d %H:%M:%S"),
            run.tool_name,
            run.provider,
            run.model,
            run.tokens.map_or_else(|| "?".to_string(), |t| t.to_string()),
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress spinner
// ---------------------------------------------------------------------------

/// Spinner shown while network-bound commands run.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new(message: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}
