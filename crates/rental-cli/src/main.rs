//! Rental desk command-line client.
//!
//! Administers reservation statuses against the rental backend.

mod commands;
mod formatter;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::Command;
use formatter::OutputFormat;
use rental_client::{MailerConfig, StoreConfig, DEFAULT_SCHEMA};

/// Rental desk command-line client
#[derive(Parser, Debug)]
#[command(name = "rental")]
#[command(version, about = "Reservation status administration")]
pub struct Args {
    /// Base URL of the backend project
    #[arg(long, env = "RENTAL_STORE_URL")]
    pub url: String,

    /// Public API key of the project
    #[arg(long, env = "RENTAL_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Access token of the logged-in administrator
    #[arg(long, env = "RENTAL_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Database schema
    #[arg(long, env = "RENTAL_SCHEMA", default_value = DEFAULT_SCHEMA)]
    pub schema: String,

    /// Endpoint accepting status emails
    #[arg(long, env = "RENTAL_MAIL_ENDPOINT")]
    pub mail_endpoint: Option<String>,

    /// Key for the mail endpoint
    #[arg(long, env = "RENTAL_MAIL_API_KEY", hide_env_values = true)]
    pub mail_api_key: Option<String>,

    /// Sender address of status emails
    #[arg(long, env = "RENTAL_MAIL_FROM", default_value = "noreply@localhost")]
    pub mail_from: String,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// Store configuration from the arguments.
    pub fn store_config(&self) -> StoreConfig {
        let mut config = StoreConfig::new(&self.url, &self.api_key)
            .with_schema(&self.schema)
            .with_timeout(Duration::from_secs(self.timeout));
        if let Some(token) = &self.access_token {
            config = config.with_access_token(token);
        }
        config
    }

    /// Mail configuration, when a mail endpoint is set.
    pub fn mailer_config(&self) -> Option<MailerConfig> {
        let endpoint = self.mail_endpoint.as_ref()?;
        let mut config = MailerConfig::new(endpoint, &self.mail_from)
            .with_timeout(Duration::from_secs(self.timeout));
        if let Some(key) = &self.mail_api_key {
            config = config.with_api_key(key);
        }
        Some(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so JSON output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rental_cli=info,rental_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    tracing::debug!(url = %args.url, format = %args.format, "configuration loaded");

    let formatter: Arc<dyn formatter::Formatter> = Arc::from(formatter::create_formatter(args.format));
    commands::execute(&args, formatter).await
}
