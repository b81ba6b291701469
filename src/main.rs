use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use crossterm::event::{Event as CrosstermEvent, EventStream};
use futures_util::StreamExt;
use log::info;
use tokio::sync::mpsc;

use guardchat::agent::providers::http::HttpTransport;
use guardchat::agent::{AgentManager, AgentSettings, ConversationEntry, InspectorSnapshot, Role};
use guardchat::app::App;
use guardchat::event::Event;
use guardchat::{logging, tui, ui};

#[derive(Parser)]
#[command(name = "guardchat", version)]
#[command(about = "Chat with policy-guarded AI agents from the terminal", long_about = None)]
struct Cli {
    /// Agent catalogue to load instead of `config/agents.toml`.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Agent tab to open first.
    #[arg(long, value_name = "ID")]
    agent: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the configured agents
    Agents,
    /// List an agent's prompt templates
    Prompts {
        agent: String,
    },
    /// Send one message and print the policy result
    Send {
        agent: String,
        /// Message text
        #[arg(required_unless_present = "prompt")]
        text: Option<String>,
        /// Send a prompt template by key instead of free text
        #[arg(long, conflicts_with = "text")]
        prompt: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let workspace_root = env::current_dir().context("failed to resolve working directory")?;

    match cli.command {
        None => {
            let log_target = logging::init_file_logging(&workspace_root)?;
            let settings = load_settings(cli.config.as_deref(), &workspace_root)?;
            info!("Starting terminal UI, logging to {}", log_target.display());
            run_tui(settings, cli.agent).await
        }
        Some(command) => {
            logging::init_stderr_logging();
            let settings = load_settings(cli.config.as_deref(), &workspace_root)?;
            match command {
                Commands::Agents => list_agents(&settings),
                Commands::Prompts { agent } => list_prompts(&settings, &agent),
                Commands::Send {
                    agent,
                    text,
                    prompt,
                } => send_once(settings, &agent, text, prompt).await,
            }
        }
    }
}

fn load_settings(config: Option<&Path>, workspace_root: &Path) -> Result<AgentSettings> {
    match config {
        Some(path) => AgentSettings::load_from(path),
        None => AgentSettings::load(workspace_root),
    }
}

async fn run_tui(settings: AgentSettings, agent: Option<String>) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let transport = Arc::new(HttpTransport::new()?);
    let mut manager = AgentManager::new(settings, transport, Box::new(tx))?;
    if let Some(agent) = agent {
        manager.activate(&agent)?;
    }
    let mut app = App::new(manager, rx);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = event_loop(&mut terminal, &mut app).await;
    tui::restore()?;
    result
}

async fn event_loop(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut stream = EventStream::new();
    let mut interval = tokio::time::interval(app.tick_rate());

    while !app.should_quit {
        terminal.draw(|frame| ui::render(frame, app))?;

        let event = tokio::select! {
            _ = interval.tick() => Event::Tick,
            maybe_event = stream.next() => {
                match maybe_event {
                    Some(Ok(CrosstermEvent::Key(key))) => Event::Key(key),
                    Some(Ok(CrosstermEvent::Mouse(mouse))) => Event::Mouse(mouse),
                    Some(Ok(CrosstermEvent::Resize(_, _))) => Event::Resize,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => return Err(err.into()),
                    None => break,
                }
            }
        };

        match event {
            Event::Tick => app.on_tick(),
            Event::Key(key) => app.handle_key(key),
            Event::Mouse(mouse) => app.handle_mouse(mouse),
            Event::Resize => {}
        }
    }
    Ok(())
}

fn list_agents(settings: &AgentSettings) -> Result<()> {
    let default = settings.default_agent().map(|agent| agent.id.as_str());
    for agent in &settings.agents {
        let marker = if Some(agent.id.as_str()) == default { "*" } else { " " };
        println!(
            "{} {:<28} {:<22} {:<12} {}",
            marker,
            agent.id,
            agent.label,
            agent.badge.as_deref().unwrap_or("-"),
            agent.resolved_webhook()
        );
    }
    Ok(())
}

fn list_prompts(settings: &AgentSettings, agent_id: &str) -> Result<()> {
    let Some(agent) = settings.agent(agent_id) else {
        bail!("unknown agent: {agent_id}");
    };
    for prompt in &agent.prompts {
        let preview: String = prompt.text.split_whitespace().collect::<Vec<_>>().join(" ");
        println!("{:<30} {:<24} {}", prompt.key, prompt.label, preview);
    }
    Ok(())
}

async fn send_once(
    settings: AgentSettings,
    agent_id: &str,
    text: Option<String>,
    prompt: Option<String>,
) -> Result<()> {
    let transport = Arc::new(HttpTransport::new()?);
    let deadline = settings.settle_deadline();
    let mut manager = AgentManager::new(settings, transport, Box::new(()))?;
    let message_id = match (prompt, text) {
        (Some(key), _) => manager.submit_prompt(agent_id, &key)?,
        (None, Some(text)) => manager.submit(agent_id, &text)?,
        (None, None) => bail!("nothing to send"),
    };
    // The controller enforces its own timeout; this only guards a disabled one.
    tokio::time::timeout(deadline, manager.settle())
        .await
        .context("no response from the agent")??;

    let entries = manager.store().list(agent_id)?;
    for entry in entries.iter().filter(|entry| entry.id() >= message_id) {
        print_entry(entry);
    }
    print_snapshot(&manager.snapshot(agent_id));
    Ok(())
}

fn print_entry(entry: &ConversationEntry) {
    match entry {
        ConversationEntry::Message(message) => {
            let who = match message.role {
                Role::User => "you",
                Role::Assistant => "agent",
                Role::System => "system",
            };
            println!("[{}] {}", who, message.text);
            if let Some(original) = message.original_text.as_deref() {
                println!("       (rewritten from: {})", original);
            }
        }
        ConversationEntry::Policy(record) => {
            println!(
                "[policy] {}: {}",
                record.event.decision.heading(),
                record.event.reason.as_deref().unwrap_or_default()
            );
            for detail in record.event.details() {
                println!("         {}", detail);
            }
        }
        ConversationEntry::Notice(record) => {
            println!("[{}] {}", record.notice.title, record.notice.detail);
            for detail in &record.notice.details {
                println!("         {}", detail);
            }
        }
    }
}

fn print_snapshot(snapshot: &InspectorSnapshot) {
    println!();
    println!(
        "decision: {}",
        snapshot.decision().map_or("-", |decision| decision.as_str())
    );
    println!("reason:   {}", snapshot.reason());
    println!("stage:    {}", snapshot.stage().unwrap_or("-"));
    println!("dlp:      {}", snapshot.dlp_signals().join(", "));
    println!("ai:       {}", snapshot.ai_signals().join(", "));
    if let Some(text) = snapshot.rewritten_text() {
        println!("rewrite:  {}", text);
    }
}
