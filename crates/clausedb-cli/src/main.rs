//! `clausedb`: query a clause corpus in natural language.
//!
//! # Usage
//!
//! ```
//! clausedb rebuild --corpus data/clauses.jsonl --field company --field amount
//! clausedb query "What are the termination fees?"
//! clausedb schema
//! clausedb serve --port 8080
//! ```
//!
//! Settings come from `clausedb.toml` (or `--config`) and `CLAUSEDB__*`
//! environment variables, e.g. `CLAUSEDB__LLM__ENABLED=true`.

mod render;
mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use clausedb_api::RebuildSource;
use clausedb_engine::{Capabilities, Engine, corpus::load_corpus};
use clausedb_llm::{LlmConfig, OpenAiClient};
use clausedb_store_sqlite::SqliteRegistry;
use settings::Settings;
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "clausedb", version, about = "Natural-language queries over legal clauses")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "clausedb.toml")]
  config: PathBuf,

  /// Print machine-readable JSON instead of text.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Answer a query, discovering new fields as needed.
  Query {
    query: String,
  },
  /// List registered fields.
  Schema,
  /// Reload the corpus and re-extract the base fields.
  Rebuild {
    /// JSONL corpus; overrides `corpus_path`.
    #[arg(long)]
    corpus: Option<PathBuf>,
    /// Ingest at most this many clauses; overrides `clause_limit`.
    #[arg(long)]
    limit:  Option<usize>,
    /// Base field to extract; repeat for several. Overrides `base_fields`.
    #[arg(long = "field")]
    fields: Vec<String>,
  },
  /// Run the built-in query battery against a scratch registry.
  SelfTest,
  /// Serve the JSON API.
  Serve {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  let registry = SqliteRegistry::open(&settings.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.store_path))?;
  let engine = Arc::new(Engine::new(
    Arc::new(registry),
    capabilities(&settings.llm),
    settings.extraction.clone(),
  ));

  match cli.command {
    Command::Query { query } => match engine.handle_query(&query).await {
      Ok(response) if cli.json => println!("{}", serde_json::to_string_pretty(&response)?),
      Ok(response) => print!("{}", render::response(&response)),
      Err(failure) => {
        eprint!("{}", render::failure(&failure));
        std::process::exit(1);
      }
    },
    Command::Schema => {
      let fields = engine.list_schema().await?;
      if cli.json {
        println!("{}", serde_json::to_string_pretty(&fields)?);
      } else {
        print!("{}", render::schema(&fields));
      }
    }
    Command::Rebuild { corpus, limit, fields } => {
      let path = corpus.unwrap_or(settings.corpus_path);
      let clauses = load_corpus(&path, limit.or(settings.clause_limit)).await?;
      let base_fields = if fields.is_empty() { settings.base_fields } else { fields };
      let report = engine.rebuild(clauses, &base_fields).await?;
      if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
      } else {
        print!("{}", render::rebuild(&report));
      }
    }
    Command::SelfTest => {
      let report = engine.self_test().await;
      if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
      } else {
        print!("{}", render::self_test(&report));
      }
      if !report.all_passed() {
        std::process::exit(1);
      }
    }
    Command::Serve { host, port } => {
      let source = RebuildSource {
        corpus_path: settings.corpus_path,
        limit:       settings.clause_limit,
        base_fields: settings.base_fields,
      };
      let app = axum::Router::new().nest("/api", clausedb_api::api_router(engine, source));
      let address = format!(
        "{}:{}",
        host.unwrap_or(settings.host),
        port.unwrap_or(settings.port)
      );

      info!("Listening on http://{address}");
      let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
      axum::serve(listener, app).await.context("server error")?;
    }
  }

  Ok(())
}

/// Model-backed capabilities when enabled and a key is available, lexical
/// ones otherwise.
fn capabilities(llm: &LlmConfig) -> Capabilities {
  if !llm.enabled {
    return Capabilities::lexical();
  }
  match OpenAiClient::from_config(llm) {
    Ok(client) => {
      info!(model = client.model(), "using model-backed capabilities");
      Capabilities::from_model(Arc::new(client))
    }
    Err(e) => {
      warn!(error = %e, "model unavailable, using lexical capabilities");
      Capabilities::lexical()
    }
  }
}
