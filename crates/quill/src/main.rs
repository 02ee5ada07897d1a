//! Interactive authoring session in the terminal.
//!
//! Reads one message per line from stdin and prints each reply. Reads the
//! OpenRouter key from `OPENROUTER_KEY` and the Google Docs access token
//! from `GOOGLE_DOCS_TOKEN` (read on every request, so it can be refreshed
//! while the session runs).
//!
//! # Examples
//!
//! ```sh
//! # Write into Google Docs, keeping sessions on disk
//! quill --session thesis --sessions-dir ~/.quill/sessions --sources ./notes
//!
//! # Try the workflow against an in-memory document
//! quill --offline --style apa --stream
//! ```
//!
//! Lines starting with `/` are commands: `/status`, `/reset`, `/quit`.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use quill::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Author a structured document section by section.
#[derive(Parser)]
#[command(name = "quill")]
struct Cli {
    // ── Models ─────────────────────────────────────────────────
    /// Model for proposals and section drafts.
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Cheaper model for classification and outline extraction.
    #[arg(long)]
    triage_model: Option<String>,

    /// Sampling temperature.
    #[arg(long, default_value_t = 0.3)]
    temperature: f32,

    /// Maximum tokens per model response.
    #[arg(long, default_value_t = 4096)]
    max_tokens: u32,

    /// Retries for failed model calls.
    #[arg(long, default_value_t = 2)]
    retries: u32,

    /// Stream model output to stderr while it is generated.
    #[arg(long)]
    stream: bool,

    // ── Document ───────────────────────────────────────────────
    /// Formatting preset: abnt or apa.
    #[arg(long, default_value_t = FormatStyle::Abnt)]
    style: FormatStyle,

    /// Title used when a proposal does not name one.
    #[arg(long)]
    default_title: Option<String>,

    /// Keep markers in the document after the last section.
    #[arg(long)]
    no_finalize: bool,

    /// Use an in-memory document instead of Google Docs.
    #[arg(long)]
    offline: bool,

    /// Google Docs API base URL.
    #[arg(long, default_value = quill::config::DEFAULT_DOCS_BASE_URL)]
    docs_base_url: String,

    /// Where to send the user when document access is revoked.
    #[arg(long)]
    reauthorize_url: Option<String>,

    // ── Session ────────────────────────────────────────────────
    /// Session identifier.
    #[arg(long, default_value = "default")]
    session: String,

    /// Directory for persisted sessions. In memory when omitted.
    #[arg(long)]
    sessions_dir: Option<PathBuf>,

    /// Directory of .txt/.md files used as retrieval sources.
    #[arg(long)]
    sources: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> AuthoringConfig {
        let mut config = AuthoringConfig::new(&self.model)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_retries(self.retries)
            .with_streaming(self.stream)
            .with_style(self.style)
            .with_finalize_on_completion(!self.no_finalize)
            .with_docs_base_url(&self.docs_base_url);
        if let Some(triage) = &self.triage_model {
            config = config.with_triage_model(triage);
        }
        if let Some(title) = &self.default_title {
            config = config.with_default_title(title);
        }
        if let Some(url) = &self.reauthorize_url {
            config = config.with_reauthorize_url(url);
        }
        config
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quill=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let config = cli.config();

    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "OPENROUTER_KEY environment variable is not set".to_string())?;
    let client = OpenRouterClient::new(api_key)?;
    let generator = OpenRouterGenerator::new(client, &config);

    let docs: Box<dyn DocumentService> = if cli.offline {
        Box::new(InMemoryDocuments::new())
    } else {
        if std::env::var("GOOGLE_DOCS_TOKEN").is_err() {
            warn!("GOOGLE_DOCS_TOKEN is not set; document calls will ask for re-authorization");
        }
        let client = GoogleDocsClient::new(EnvToken::new("GOOGLE_DOCS_TOKEN"), &config)
            .map_err(|e| e.to_string())?;
        Box::new(client)
    };

    let retriever: Box<dyn Retriever> = match &cli.sources {
        Some(dir) => {
            let retriever = StaticRetriever::from_dir(dir)?;
            eprintln!(
                "Loaded {} source(s) from {}",
                retriever.source_count(),
                dir.display()
            );
            Box::new(retriever)
        }
        None => Box::new(NoRetrieval),
    };

    let mut store = match &cli.sessions_dir {
        Some(dir) => SessionStore::with_dir(dir)?,
        None => SessionStore::in_memory(),
    };

    let handler = CompositeEventHandler::new()
        .with(LoggingHandler)
        .with_if(
            cli.stream,
            FnEventHandler::new(|event| {
                if let AuthoringEvent::TextDelta(text) = event {
                    eprint!("{text}");
                }
            }),
        );

    let authoring = Authoring::new(&generator, docs.as_ref(), &config)
        .with_retriever(retriever.as_ref())
        .with_event_handler(&handler);

    let session_id = cli.session.as_str();
    eprintln!("Session '{session_id}'. Commands: /status, /reset, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.map_err(|e| e.to_string())? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                store.reset(session_id)?;
                println!("Session reset.");
                continue;
            }
            "/status" => {
                let state = store.get_or_create(session_id)?;
                print_status(state);
                continue;
            }
            _ => {}
        }

        let state = store.get_or_create(session_id)?;
        let reply = authoring.handle_message(state, line).await;
        if cli.stream {
            eprintln!();
        }
        println!("{}\n", reply.text);

        if let Err(e) = store.save(session_id) {
            warn!("Failed to persist session {session_id}: {e}");
        }
    }
    Ok(())
}

fn print_status(state: &SessionState) {
    println!("phase: {}", state.phase);
    if let Some(outline) = &state.outline {
        println!("outline: {} ({} sections)", outline.title, outline.sections.len());
    }
    if let Some(id) = &state.document_id {
        println!("document: {id}");
    }
    if let Some(pending) = &state.pending {
        println!("pending: {}", pending.title);
    }
    println!("completed: {}", state.completed.join(", "));
    let queued: Vec<&str> = state.queue.iter().map(|r| r.title.as_str()).collect();
    println!("queued: {}", queued.join(", "));
}
