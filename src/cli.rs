use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Calvox - speak or type calendar commands, backed by Google Calendar
#[derive(Debug, Parser)]
#[command(name = "calvox")]
#[command(about = "Voice and text calendar assistant with a local tool endpoint", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute (if not specified, runs the listen loop)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the tool endpoint and read utterances from the terminal
    Listen,

    /// Start only the tool endpoint
    Serve {
        /// Address to bind, overriding the config
        #[arg(long)]
        host: Option<String>,
        /// Port to bind, overriding the config
        #[arg(long)]
        port: Option<u16>,
    },

    /// Dispatch a single utterance and exit
    Say {
        #[arg(required = true, num_args = 1..)]
        words: Vec<String>,
    },

    /// Show the next upcoming event across all calendars
    Next,

    /// Delete the earliest matching event
    Delete {
        /// Words from the event title
        #[arg(long)]
        summary: Option<String>,
        /// Start of the search window, e.g. "tomorrow"
        #[arg(long)]
        start: Option<String>,
        /// End of the search window
        #[arg(long)]
        end: Option<String>,
        /// Calendar name, alias or id
        #[arg(long)]
        calendar: Option<String>,
        /// Treat the window as whole days
        #[arg(long)]
        all_day: bool,
    },

    /// List the calendars of the account
    Calendars,

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigActions,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigActions {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file location
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_listen() {
        let cli = Cli::try_parse_from(["calvox"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_say_joins_words() {
        let cli = Cli::try_parse_from(["calvox", "say", "Team", "meeting", "tomorrow"]).unwrap();
        match cli.command {
            Some(Commands::Say { words }) => assert_eq!(words.join(" "), "Team meeting tomorrow"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_delete_flags() {
        let cli = Cli::try_parse_from([
            "calvox", "delete", "--summary", "dentist", "--start", "tomorrow", "--all-day", "--config", "/tmp/c.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        match cli.command {
            Some(Commands::Delete { summary, start, end, calendar, all_day }) => {
                assert_eq!(summary.as_deref(), Some("dentist"));
                assert_eq!(start.as_deref(), Some("tomorrow"));
                assert!(end.is_none() && calendar.is_none());
                assert!(all_day);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_say_requires_words() {
        assert!(Cli::try_parse_from(["calvox", "say"]).is_err());
    }
}
