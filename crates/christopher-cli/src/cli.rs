//! CLI argument definitions for Christopher.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Christopher -- routes each message to the handler best suited to answer it.
#[derive(Debug, Parser)]
#[command(
    name = "christopher",
    version,
    about = "Christopher -- intent-routed assistant",
    long_about = "Classifies free-text input against the registered handlers \
                  (math, weather, writing, programming, ...) and returns the \
                  chosen handler's answer."
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log output format.  Overrides `[logging] format`.
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start an interactive chat session.
    Chat {
        /// Record the conversation under this thread id.
        #[arg(long, short)]
        thread: Option<String>,
    },

    /// Route a single message and print the answer.
    Ask {
        /// The message; multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Start the HTTP API.
    Serve {
        /// Address to bind.  Defaults to `[server] bind`.
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on.  Defaults to `[server] port`.
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// List the handlers that would be registered with this configuration.
    Handlers,
}

/// Formatter used by the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ask_joins_words_and_globals_parse() {
        let cli = Cli::parse_from([
            "christopher",
            "--log-format",
            "json",
            "ask",
            "what",
            "is",
            "2+2",
            "--config",
            "alt.toml",
        ]);
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        match cli.command {
            Commands::Ask { text } => assert_eq!(text.join(" "), "what is 2+2"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn serve_flags_are_optional() {
        let cli = Cli::parse_from(["christopher", "serve", "--port", "9001"]);
        match cli.command {
            Commands::Serve { bind, port } => {
                assert_eq!(bind, None);
                assert_eq!(port, Some(9001));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn chat_thread_short_flag() {
        let cli = Cli::parse_from(["christopher", "chat", "-t", "t-1"]);
        assert!(matches!(cli.command, Commands::Chat { thread: Some(ref t) } if t == "t-1"));
    }

    #[test]
    fn ask_requires_text() {
        assert!(Cli::try_parse_from(["christopher", "ask"]).is_err());
    }
}
