//! Subcommand execution.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Subcommand;

use rental_client::{HttpMailer, RealtimeClient, RealtimeConfig, RestClient};
use rental_core::{ChangeFeed, ChangeHub, EmailMessage, MailError, Mailer, ReservationService};
use rental_proto::{ReservationId, ReservationStatus};

use crate::formatter::Formatter;
use crate::Args;

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Change the status of a reservation and notify the customer
    SetStatus {
        /// Reservation id
        reservation_id: String,

        /// New status (pending, confirmed, cancelled, completed)
        status: ReservationStatus,

        /// Comment recorded in the status history
        #[arg(short, long, conflicts_with = "default_comment")]
        comment: Option<String>,

        /// Record the standard comment for the new status
        #[arg(long)]
        default_comment: bool,
    },

    /// Show the status history of a reservation, newest first
    History {
        /// Reservation id
        reservation_id: String,
    },

    /// Show a reservation with its customer and items
    Show {
        /// Reservation id
        reservation_id: String,
    },

    /// Print reservation changes as they happen until interrupted
    Watch,
}

/// Stand-in mailer used when no mail endpoint is configured. Every send
/// fails, which the workflow logs and otherwise ignores.
struct UnconfiguredMailer;

#[async_trait]
impl Mailer for UnconfiguredMailer {
    async fn send(&self, _message: &EmailMessage) -> Result<(), MailError> {
        Err(MailError::Transport("no mail endpoint configured".to_string()))
    }
}

/// Execute one subcommand.
pub async fn execute(args: &Args, formatter: Arc<dyn Formatter>) -> anyhow::Result<()> {
    match &args.command {
        Command::SetStatus {
            reservation_id,
            status,
            comment,
            default_comment,
        } => {
            let service = build_service(args, Arc::new(ChangeHub::new()))?;
            let id = ReservationId::new(reservation_id.as_str());
            let comment = match (comment, *default_comment) {
                (Some(comment), _) => Some(comment.clone()),
                (None, true) => Some(status.default_comment().to_string()),
                (None, false) => None,
            };

            service.update_status(&id, *status, comment.clone()).await?;
            println!(
                "{}",
                formatter.format_status_change(&id, *status, comment.as_deref())
            );
        }

        Command::History { reservation_id } => {
            let service = build_service(args, Arc::new(ChangeHub::new()))?;
            let entries = service
                .history(&ReservationId::new(reservation_id.as_str()))
                .await?;
            println!("{}", formatter.format_history(&entries));
        }

        Command::Show { reservation_id } => {
            let service = build_service(args, Arc::new(ChangeHub::new()))?;
            let details = service
                .details(&ReservationId::new(reservation_id.as_str()))
                .await?;
            println!("{}", formatter.format_details(&details));
        }

        Command::Watch => {
            let realtime = RealtimeConfig::from_store(&args.store_config())?;
            let feed = RealtimeClient::connect(realtime).await?;
            let service = build_service(args, Arc::new(feed))?;

            let printer = formatter.clone();
            let handle = service
                .subscribe_to_updates(move |row| {
                    println!("{}", printer.format_update(&row));
                })
                .await?;
            tracing::info!("watching reservation changes, press ctrl+c to stop");

            tokio::signal::ctrl_c().await?;
            tracing::info!("received shutdown signal");
            handle.unsubscribe();
        }
    }

    Ok(())
}

fn build_service(args: &Args, feed: Arc<dyn ChangeFeed>) -> anyhow::Result<ReservationService> {
    let rest = Arc::new(RestClient::new(args.store_config())?);

    let mailer: Arc<dyn Mailer> = match args.mailer_config() {
        Some(config) => Arc::new(HttpMailer::new(config)?),
        None => {
            tracing::debug!("no mail endpoint configured, status emails will not be sent");
            Arc::new(UnconfiguredMailer)
        }
    };

    Ok(ReservationService::new(rest.clone(), rest, mailer, feed))
}
