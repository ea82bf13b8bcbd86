use clap::{Args, Parser, Subcommand};
use zepchat_client::ChatSettings;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/api/chat";

#[derive(Parser)]
#[command(name = "zepchat")]
#[command(version, about = "ZepChat - ask questions against a Zep-backed chat server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Chat endpoint URL
    #[arg(long, global = true, env = "ZEPCHAT_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Give up on an answer after this many seconds
    #[arg(long, global = true, env = "ZEPCHAT_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// The question to ask
        #[arg(required = true)]
        question: Vec<String>,
    },

    /// Start an interactive chat
    Chat,
}

#[derive(Args, Clone, Copy)]
pub struct SettingsArgs {
    /// Sampling temperature (0 to 2)
    #[arg(long, global = true, default_value_t = ChatSettings::default().temperature)]
    pub temperature: f32,

    /// Minimum document relatedness used as context (0 to 1)
    #[arg(long, global = true, default_value_t = ChatSettings::default().relatedness)]
    pub relatedness: f32,
}

impl From<SettingsArgs> for ChatSettings {
    fn from(args: SettingsArgs) -> Self {
        ChatSettings {
            temperature: args.temperature,
            relatedness: args.relatedness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_with_settings() {
        let cli = Cli::try_parse_from([
            "zepchat",
            "ask",
            "--temperature",
            "0.4",
            "what",
            "is",
            "fever?",
        ])
        .unwrap();

        let Commands::Ask { question } = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(question.join(" "), "what is fever?");
        assert_eq!(ChatSettings::from(cli.settings).temperature, 0.4);
        assert_eq!(
            ChatSettings::from(cli.settings).relatedness,
            ChatSettings::default().relatedness
        );
    }
}
