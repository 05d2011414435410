//! Command-line interface parsing and runtime entry.

use std::env;
use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::core::chat_stream::CompletionClient;
use crate::core::language::Language;
use crate::core::model::ModelId;
use crate::core::session::Session;
use crate::core::transcript::{TranscriptStore, TRANSCRIPT_FILE};
use crate::ui;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const API_KEY_ENV: &str = "GROQ_API_KEY";
const BASE_URL_ENV: &str = "GROQ_BASE_URL";

#[derive(Parser)]
#[command(name = "charla")]
#[command(about = "A terminal chat client with streaming responses and a persistent transcript")]
#[command(long_about = "Charla is a terminal chat client that connects to the Groq API for \
real-time conversations. Responses stream in token by token and the whole \
transcript is mirrored to disk, so the conversation survives restarts.\n\n\
Environment Variables:\n\
  GROQ_API_KEY    Your Groq API key (required)\n\
  GROQ_BASE_URL   Custom API base URL (optional)\n\n\
Commands inside the chat:\n\
  /model [id]       Switch model, or list the available ones\n\
  /language [code]  Switch response language (es, en, fr)\n\
  /clear            Wipe the transcript and its file\n\
  /quit             Leave the chat")]
pub struct Args {
    /// Model to use for chat, from the fixed set; lists with /model
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Response language code (es, en, fr; default es)
    #[arg(short, long, value_name = "CODE")]
    pub language: Option<String>,

    /// Override the API base URL
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Override the transcript file path
    #[arg(long, value_name = "FILE")]
    pub transcript: Option<PathBuf>,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let model = match args.model.as_deref() {
        Some(id) => ModelId::try_from(id)
            .map_err(|e| format!("{e} (available: {})", model_list()))?,
        None => ModelId::default(),
    };
    let language = match args.language.as_deref() {
        Some(code) => Language::try_from(code)
            .map_err(|e| format!("{e} (available: {})", language_list()))?,
        None => Language::default(),
    };

    let api_key = env::var(API_KEY_ENV).map_err(|_| {
        format!(
            "❌ {API_KEY_ENV} environment variable not set\n\n\
             Please set your Groq API key:\n\
             export {API_KEY_ENV}=\"your-api-key-here\""
        )
    })?;
    let base_url = args
        .base_url
        .or_else(|| env::var(BASE_URL_ENV).ok())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let store = TranscriptStore::new(
        args.transcript
            .unwrap_or_else(|| PathBuf::from(TRANSCRIPT_FILE)),
    );
    let client = CompletionClient::new(base_url, api_key);
    let mut session = Session::new(store, client, model, language);

    // Corrupt persisted history is fatal; the file is left in place for
    // the operator to inspect.
    session.hydrate()?;

    eprintln!("🤖 Charla");
    eprintln!("📡 Modelo: {model}");
    eprintln!("🌐 Endpoint: {}", session.endpoint());
    eprintln!("💬 Idioma: {}", session.language().display_name());

    ui::run_chat(session).await
}

fn model_list() -> String {
    ModelId::ALL.map(|model| model.as_str()).join(", ")
}

fn language_list() -> String {
    Language::ALL.map(|language| language.code()).join(", ")
}
