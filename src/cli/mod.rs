//! Command-line parsing and process startup.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use crate::core::backend::BackendKind;
use crate::core::config::Config;
use crate::core::model_cache::ModelCache;
use crate::core::registry::Registry;
use crate::core::session::{AppContext, Session};
use crate::ui::chat_loop::{ChatLoop, CtrlC, ExitReason};
use crate::ui::console::Console;
use crate::ui::panel::InlinePanel;
use crate::ui::theme::Theme;
use crate::utils::line_editor::{default_history_path, LineEditor};
use crate::utils::logging;

pub const PROMPT: &str = "azc> ";
const FAREWELL: &str = "👋 Bye";
const NO_BACKENDS_EXIT: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "azc", version)]
#[command(about = "Chat with OpenAI, Anthropic, Gemini or Ollama models from the terminal")]
#[command(long_about = "azc streams chat replies from the first configured backend into a \
panel sized to your terminal.\n\n\
Environment Variables (a .env file in the working directory is read too):\n\
  OPENAI_API_KEY      OpenAI API key\n\
  OPENAI_BASE_URL     Custom OpenAI-compatible base URL (optional)\n\
  OLLAMA_URL          Ollama server URL, e.g. http://localhost:11434\n\
  ANTHROPIC_API_KEY   Anthropic API key\n\
  GEMINI_API_KEY      Google Gemini API key\n\
  AZC_LOG             Log filter, e.g. azc=debug (default warn)\n\n\
Type ? or h at the prompt for the list of commands.")]
pub struct Args {
    /// Initial message, sent before the prompt opens
    #[arg(value_name = "MESSAGE")]
    pub words: Vec<String>,

    /// Submit on a blank line instead of on every line
    #[arg(long)]
    pub multiline: bool,

    /// Provider to start with (partial name okay)
    #[arg(short = 'p', long, value_name = "PROVIDER")]
    pub provider: Option<String>,

    /// Model to start with (partial name okay)
    #[arg(short = 'm', long, value_name = "MODEL")]
    pub model: Option<String>,

    /// System instruction for every new chat
    #[arg(long, value_name = "TEXT", conflicts_with = "no_primer")]
    pub primer: Option<String>,

    /// Start chats without a system instruction
    #[arg(long)]
    pub no_primer: bool,

    /// Config file location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Model cache location
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Prompt history location
    #[arg(long, value_name = "PATH")]
    pub history: Option<PathBuf>,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(short = 'l', long, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

impl Args {
    pub fn initial_message(&self) -> Option<String> {
        let message = self.words.join(" ");
        (!message.trim().is_empty()).then_some(message)
    }

    /// The system instruction for a terminal `rows` tall.
    pub fn primer(&self, rows: u16) -> Option<String> {
        if self.no_primer {
            return None;
        }
        Some(self.primer.clone().unwrap_or_else(|| default_primer(rows)))
    }
}

pub fn default_primer(rows: u16) -> String {
    let lines = rows.saturating_sub(4).max(1);
    format!("please limit your response to {lines} lines at most")
}

pub fn missing_backends_message() -> String {
    let vars = BackendKind::ALL
        .iter()
        .map(|kind| format!("  {:<18} {}", kind.credential_var(), kind.label()))
        .collect::<Vec<_>>()
        .join("\n");
    format!("No backends configured. Set at least one of:\n{vars}")
}

pub fn main() -> Result<ExitCode, Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if let Err(err) = logging::init(args.log.as_deref()) {
        eprintln!("⚠️  logging disabled: {err}");
    }

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(run(args))
}

async fn run(args: Args) -> Result<ExitCode, Box<dyn Error>> {
    let theme = Theme::default();
    let mut console = Console::stdout(theme.clone());

    let config_path = Config::resolve_path(args.config.as_deref());
    let config = match Config::load_from_path(&config_path) {
        Ok(config) => config,
        Err(err) => {
            console.warning(&format!("{err}; using defaults"))?;
            Config::default()
        }
    };

    let registry = Registry::from_env();
    if registry.is_empty() {
        eprintln!("{}", missing_backends_message());
        return Ok(ExitCode::from(NO_BACKENDS_EXIT));
    }
    let available = registry
        .available_backends()
        .iter()
        .map(|kind| kind.tag())
        .collect::<Vec<_>>()
        .join(", ");

    let cache = ModelCache::open(args.cache.clone().unwrap_or_else(ModelCache::default_path));
    let rows = ratatui::crossterm::terminal::size()
        .map(|(_, rows)| rows)
        .unwrap_or(24);

    let context = AppContext {
        registry,
        config,
        cache,
        primer: args.primer(rows),
    };
    let mut session = Session::start(context, args.provider.as_deref(), args.model.as_deref()).await?;

    console.labelled("providers configured: ", &available)?;
    console.labelled("using: ", &session.provider().identify())?;
    console.info("type ? or h for help")?;

    let history = args.history.clone().unwrap_or_else(default_history_path);
    let editor = LineEditor::open(Some(history), args.multiline)?;
    let mut chat = ChatLoop::new(
        &mut session,
        editor,
        console,
        InlinePanel::new(theme),
        CtrlC::default(),
    );
    let reason = chat.run(args.initial_message(), PROMPT).await?;
    info!(?reason, "chat loop ended");

    let (_, mut console, _) = chat.into_parts();
    if reason == ExitReason::Interrupted {
        println!();
    }
    console.info(FAREWELL)?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests;
