//! Discord webhook delivery.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::domain::DomainEvent;
use crate::error::AppError;

/// Discord rejects message content longer than this.
const MAX_CONTENT_CHARS: usize = 2000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Posts operational messages to a Discord webhook.
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
}

impl DiscordNotifier {
    /// Creates a notifier for `webhook_url`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Delivery`] if the HTTP client cannot be built.
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Delivery(e.to_string()))?;
        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
        })
    }

    /// Posts one message.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Delivery`] on transport failure or a non-success
    /// status.
    pub async fn send(&self, content: &str) -> Result<(), AppError> {
        let content = truncate(content, MAX_CONTENT_CHARS);
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&WebhookPayload { content })
            .send()
            .await
            .map_err(|e| AppError::Delivery(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AppError::Delivery(format!("webhook answered {status}")))
        }
    }

    /// Spawns the bus subscriber forwarding lifecycle events.
    pub fn spawn(self, mut event_rx: broadcast::Receiver<DomainEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match event_rx.recv().await {
                    Ok(event) => {
                        let Some(message) = format_message(&event) else {
                            continue;
                        };
                        if let Err(err) = self.send(&message).await {
                            tracing::error!(
                                event_type = event.event_type_str(),
                                error = %err,
                                "discord delivery failed"
                            );
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "discord notifier lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Renders the operator message for a domain event. High-volume events
/// (votes, tallies, check-ins, catalog edits) produce none.
#[must_use]
pub fn format_message(event: &DomainEvent) -> Option<String> {
    match event {
        DomainEvent::EventCreated {
            event_id,
            name,
            code,
            ..
        } => Some(format!(
            ":tada: Event **{name}** created (code `{code}`, id {event_id})"
        )),
        DomainEvent::EventRemoved { event_id, name, .. } => Some(format!(
            ":wastebasket: Event **{name}** deleted (id {event_id})"
        )),
        DomainEvent::UserRegistered { email, .. } => {
            Some(format!(":bust_in_silhouette: New organizer {email}"))
        }
        DomainEvent::SubscriptionActivated {
            user_id, package, ..
        } => Some(format!(
            ":white_check_mark: Package `{package}` activated for user {user_id}"
        )),
        DomainEvent::InvoicePaid {
            invoice_id,
            amount_vnd,
            ..
        } => Some(format!(
            ":moneybag: Invoice {invoice_id} paid: {amount_vnd} VND"
        )),
        DomainEvent::CatalogChanged { .. }
        | DomainEvent::GuestCheckedIn { .. }
        | DomainEvent::VotesReplaced { .. }
        | DomainEvent::TallyUpdated { .. } => None,
    }
}

fn truncate(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => content.get(..idx).unwrap_or(content),
        None => content,
    }
}
