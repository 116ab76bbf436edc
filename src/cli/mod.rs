use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "transcript-relay",
    about = "Transcript Relay - Fetch YouTube transcripts with automatic fallback and manual upload",
    version,
    long_about = "An HTTP service that fetches the transcript of a YouTube video by trying the caption API first and yt-dlp second. When both fail, the caller receives every failure reason and can upload the transcript by hand."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Configuration file (defaults to ./transcript-relay.yaml, then the user config dir)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP service
    Serve {
        /// Address to bind
        #[arg(long, env = "HOST", value_name = "ADDR")]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long, env = "PORT", value_name = "PORT")]
        port: Option<u16>,
    },

    /// Fetch one transcript and print the response body
    Fetch {
        /// YouTube video id
        #[arg(value_name = "VIDEO_ID")]
        video_id: String,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List the acquisition strategies in priority order
    Strategies,

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write the default configuration file
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fetch_arguments() {
        let cli = Cli::try_parse_from(["transcript-relay", "fetch", "abc123", "--pretty", "-q"]).unwrap();
        assert!(cli.quiet);
        match cli.command {
            Commands::Fetch {
                video_id,
                pretty,
                output,
            } => {
                assert_eq!(video_id, "abc123");
                assert!(pretty);
                assert!(output.is_none());
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_config_flags_conflict() {
        assert!(Cli::try_parse_from(["transcript-relay", "config", "--show", "--init"]).is_err());
    }
}
