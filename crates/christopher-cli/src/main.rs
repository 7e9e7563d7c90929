//! CLI entry point for Christopher.
//!
//! This binary provides the `christopher` command with subcommands for
//! chatting interactively, asking one-off questions, serving the HTTP API
//! and listing the registered handlers.

mod cli;
mod config;

use std::io::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use christopher_handlers::{RegistrationReport, register_builtins};
use christopher_kernel::{CompletionClassifier, HandlerContext, HandlerRegistry, Pipeline};
use christopher_llm::LlmClient;
use christopher_store::ThreadStore;
use christopher_web::WebServer;
use christopher_web::api::THREAD_CONTEXT_KEY;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, LogFormat};
use crate::config::Config;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config.as_deref());
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;

    init_tracing(
        &config.logging.level,
        cli.log_format.unwrap_or(config.logging.format),
    );
    match &config_path {
        Some(path) => info!(path = %path.display(), "configuration loaded"),
        None => info!("no config file, using defaults"),
    }

    match cli.command {
        Commands::Chat { thread } => cmd_chat(&config, thread).await,
        Commands::Ask { text } => cmd_ask(&config, &text.join(" ")).await,
        Commands::Serve { bind, port } => cmd_serve(&config, bind, port).await,
        Commands::Handlers => cmd_handlers(&config),
    }
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber.  `RUST_LOG` wins over `default_level`.
fn init_tracing(default_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Populate the registry, build the classifier and freeze both into a
/// pipeline.
fn build_pipeline(config: &Config) -> Result<(Pipeline, RegistrationReport)> {
    let mut registry = HandlerRegistry::new();
    let report = register_builtins(&mut registry, &config.builtin_options())
        .context("failed to register the default handler")?;

    let backend =
        LlmClient::new(config.classifier_llm()).context("failed to create classifier client")?;
    let classifier = CompletionClassifier::new(Arc::new(backend));

    let pipeline = Pipeline::new(
        Arc::new(registry),
        Arc::new(classifier),
        config.router_config(),
        config.dispatcher_config(),
    )
    .context("failed to build routing pipeline")?;

    info!(
        registered = ?report.registered,
        skipped = report.skipped.len(),
        classifier = %config.classifier.provider,
        model = %config.classifier.model,
        "pipeline ready"
    );
    Ok((pipeline, report))
}

// ---------------------------------------------------------------------------
// Subcommand: chat
// ---------------------------------------------------------------------------

async fn cmd_chat(config: &Config, thread: Option<String>) -> Result<()> {
    let thread = match thread.as_deref().map(str::trim) {
        Some("") => bail!("--thread must not be blank"),
        other => other.map(str::to_owned),
    };

    let (pipeline, _) = build_pipeline(config)?;
    let threads = ThreadStore::new();

    let mut context = HandlerContext::new();
    if let Some(id) = &thread {
        context.insert(THREAD_CONTEXT_KEY.to_owned(), id.clone());
    }

    println!();
    println!("  Christopher v{}", env!("CARGO_PKG_VERSION"));
    if let Some(id) = &thread {
        println!("  Thread: {id}");
    }
    println!("  Type a message, or 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush().context("failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("failed to read input")? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            info!("user requested exit");
            break;
        }

        let reply = pipeline.run(input, &context).await;
        println!("Christopher: {}", reply.result.text);
        println!();

        if let Some(id) = &thread
            && let Err(e) =
                threads.record_exchange(id, input, &reply.handler_id, &reply.result.text)
        {
            tracing::warn!(thread_id = %id, error = %e, "failed to record exchange");
        }
    }

    if let Some(id) = &thread {
        info!(thread_id = %id, messages = threads.get_thread(id).len(), "chat ended");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: ask
// ---------------------------------------------------------------------------

async fn cmd_ask(config: &Config, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        bail!("message must not be empty");
    }

    let (pipeline, _) = build_pipeline(config)?;
    let reply = pipeline.run(text, &HandlerContext::new()).await;
    println!("{}", reply.result.text);

    if reply.result.failed {
        bail!("the {} handler failed", reply.handler_id);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(config: &Config, bind: Option<String>, port: Option<u16>) -> Result<()> {
    let (pipeline, _) = build_pipeline(config)?;
    let server = WebServer::new(
        config.web_config(bind, port),
        Arc::new(pipeline),
        ThreadStore::new(),
    );

    println!("  Christopher listening on http://{}", server.addr());
    server.start().await.context("web server failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: handlers
// ---------------------------------------------------------------------------

fn cmd_handlers(config: &Config) -> Result<()> {
    let (pipeline, report) = build_pipeline(config)?;

    println!();
    println!("  Registered handlers");
    println!("  ===================");
    for handler in pipeline.registry().list() {
        println!("  {:<12} {}", handler.id, handler.description);
    }

    if !report.skipped.is_empty() {
        println!();
        println!("  Skipped");
        println!("  =======");
        for skipped in &report.skipped {
            println!("  {:<12} {}", skipped.id, skipped.reason);
        }
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_skips_handlers_without_keys() {
        let mut config = Config::default();
        config.handlers.enabled = vec!["math".into(), "writing".into(), "weather".into()];

        let (pipeline, report) = build_pipeline(&config).unwrap();
        assert_eq!(report.registered, vec!["default", "math", "weather"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id, "writing");

        let ids: Vec<String> = pipeline
            .registry()
            .list()
            .into_iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(ids, vec!["default", "math", "weather"]);
    }

    #[test]
    fn pipeline_registers_keyed_handlers() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test".into()),
            "ANTHROPIC_API_KEY" => Some("ak-test".into()),
            _ => None,
        });

        let (pipeline, report) = build_pipeline(&config).unwrap();
        assert!(report.skipped.is_empty());
        assert_eq!(pipeline.registry().len(), 5);
        assert!(pipeline.registry().contains("programming"));
    }

    #[test]
    fn classifier_client_must_be_buildable() {
        let mut config = Config::default();
        config.classifier.provider = christopher_llm::LlmProvider::OpenAI;
        let err = build_pipeline(&config).err().expect("build_pipeline should fail");
        assert!(err.to_string().contains("classifier client"));
    }

    #[tokio::test]
    async fn ask_rejects_blank_text() {
        let err = cmd_ask(&Config::default(), "   ").await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
