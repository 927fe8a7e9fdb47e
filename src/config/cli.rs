use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};
use syndicate_api_types::NewsletterStatus;

/// Command-line arguments for the `syndicate` binary.
#[derive(Debug, Parser)]
#[command(
    name = "syndicate",
    version,
    about = "ContentSyndicate dashboard client"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "SYNDICATE_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the API base URL, e.g. <http://localhost:8000>.
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Override the request timeout.
    #[arg(long = "api-timeout-seconds", value_name = "SECONDS", global = true)]
    pub api_timeout_seconds: Option<u64>,

    /// Path to a file containing the bearer token (takes precedence over env).
    #[arg(
        long = "token-file",
        env = "SYNDICATE_TOKEN_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub token_file: Option<PathBuf>,

    /// Bearer token; hidden so tokens are passed through the environment.
    #[arg(long = "api-token", hide = true, env = "SYNDICATE_API_TOKEN", global = true)]
    pub token_env: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the number of retries for failed reads.
    #[arg(long = "query-retry", value_name = "COUNT", global = true)]
    pub query_retry: Option<u32>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Newsletter management
    Newsletters(NewslettersArgs),
    /// Content source management
    Sources(SourcesArgs),
    /// Subscriber management
    Subscribers(SubscribersArgs),
    /// Show the analytics dashboard summary
    Dashboard,
    /// Show the signed-in account
    Profile,
}

#[derive(Debug, Args, Clone)]
pub struct NewslettersArgs {
    #[command(subcommand)]
    pub action: NewslettersCmd,
}

#[derive(Debug, Subcommand, Clone)]
pub enum NewslettersCmd {
    /// List newsletters, newest first
    List {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show one newsletter
    Get { id: i64 },
    /// Create a draft newsletter
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        audience: Option<String>,
        /// Content source identifier; repeatable
        #[arg(long = "source", value_name = "SOURCE", required = true)]
        sources: Vec<String>,
        /// Naive timestamp, e.g. 2026-10-20T09:00
        #[arg(long = "scheduled-for", value_name = "TIMESTAMP")]
        scheduled_for: Option<String>,
    },
    /// Update newsletter fields
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        status: Option<NewsletterStatusArg>,
        #[arg(long = "scheduled-for", value_name = "TIMESTAMP")]
        scheduled_for: Option<String>,
    },
    /// Delete a newsletter that has not been sent
    Delete { id: i64 },
    /// Show the rendered content of a newsletter
    Preview { id: i64 },
    /// Show open and click analytics for a sent newsletter
    Analytics { id: i64 },
}

#[derive(Debug, Args, Clone)]
pub struct SourcesArgs {
    #[command(subcommand)]
    pub action: SourcesCmd,
}

#[derive(Debug, Subcommand, Clone)]
pub enum SourcesCmd {
    /// List active content sources
    List,
    /// Register a content source to pull from
    Add {
        /// Platform name, e.g. reddit or hackernews
        #[arg(long)]
        platform: String,
        /// Search query sent to the platform
        #[arg(long)]
        query: String,
        /// Keyword filter; repeatable
        #[arg(long = "keyword", value_name = "KEYWORD")]
        keywords: Vec<String>,
    },
    /// Replace the settings of a content source
    Update {
        id: i64,
        #[arg(long)]
        platform: String,
        #[arg(long)]
        query: String,
        /// Keyword filter; repeatable
        #[arg(long = "keyword", value_name = "KEYWORD")]
        keywords: Vec<String>,
    },
    /// Deactivate a content source
    Delete { id: i64 },
}

#[derive(Debug, Args, Clone)]
pub struct SubscribersArgs {
    #[command(subcommand)]
    pub action: SubscribersCmd,
}

#[derive(Debug, Subcommand, Clone)]
pub enum SubscribersCmd {
    /// List subscribers
    List {
        #[command(flatten)]
        page: PageArgs,
        /// Include inactive subscribers
        #[arg(long, action = clap::ArgAction::SetTrue)]
        all: bool,
    },
    /// Add a subscriber
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Show one subscriber
    Get { id: i64 },
    /// Change a subscriber's email or name
    Update {
        id: i64,
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Remove a subscriber
    Remove { id: i64 },
    /// Show growth and churn over the last 30 days
    Stats,
}

#[derive(Debug, Args, Default, Clone, Copy)]
pub struct PageArgs {
    /// 1-based page number
    #[arg(long)]
    pub page: Option<u32>,
    /// Page size
    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum NewsletterStatusArg {
    Draft,
    Scheduled,
    Sent,
    Failed,
}

impl From<NewsletterStatusArg> for NewsletterStatus {
    fn from(value: NewsletterStatusArg) -> Self {
        match value {
            NewsletterStatusArg::Draft => NewsletterStatus::Draft,
            NewsletterStatusArg::Scheduled => NewsletterStatus::Scheduled,
            NewsletterStatusArg::Sent => NewsletterStatus::Sent,
            NewsletterStatusArg::Failed => NewsletterStatus::Failed,
        }
    }
}
