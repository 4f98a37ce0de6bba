use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::codec;
use crate::model::{Event, Reservation};
use crate::observability::NOTIFY_FAILURES_TOTAL;
use crate::records::format_timestamp;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("payload encoding: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("webhook answered {0}")]
    Status(reqwest::StatusCode),
    #[error("{0}")]
    Other(String),
}

/// Outbound message channel. Messages are HTML-lite (`<b>`, `<i>`).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

/// Writes messages to the log. Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        tracing::info!(target: "motorpool::notify", "{message}");
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Posts `{chat_id, text, parse_mode: "HTML"}` to one fixed URL.
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
    chat_id: String,
}

impl HttpNotifier {
    pub fn new(url: String, chat_id: String, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url, chat_id })
    }

    fn payload(&self, message: &str) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&WebhookPayload {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "HTML",
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(self.payload(message)?)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status()));
        }
        Ok(())
    }
}

/// Fans committed events out to in-process subscribers and to the outbound
/// notifier. Publishing never blocks and never fails the caller.
pub struct NotifyHub {
    events: broadcast::Sender<Event>,
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl NotifyHub {
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self {
            events: broadcast::channel(CHANNEL_CAPACITY).0,
            notifier,
            timeout,
        }
    }

    /// Hub that only logs outbound messages.
    pub fn logging() -> Self {
        Self::new(Arc::new(LogNotifier), Duration::from_secs(5))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Broadcast `event` and dispatch its message in the background. Returns
    /// the dispatch task, or `None` outside a runtime.
    pub fn publish(&self, event: Event) -> Option<JoinHandle<()>> {
        let message = render_message(&event);
        // No-op if nobody is listening.
        let _ = self.events.send(event);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no runtime, dropping notification");
            return None;
        };
        let notifier = self.notifier.clone();
        let timeout = self.timeout;
        Some(handle.spawn(async move {
            match tokio::time::timeout(timeout, notifier.send(&message)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!("notification failed: {e}");
                    metrics::counter!(NOTIFY_FAILURES_TOTAL).increment(1);
                }
                Err(_) => {
                    tracing::warn!("notification timed out after {timeout:?}");
                    metrics::counter!(NOTIFY_FAILURES_TOTAL).increment(1);
                }
            }
        }))
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn reservation_lines(r: &Reservation) -> String {
    format!(
        "<b>Requester:</b> {}\n<b>Task:</b> {}\n<b>Location:</b> {}\n\
         <b>Vehicle:</b> {} ({} people)\n<b>Equipment:</b> {}\n\
         <b>When:</b> {} to {}",
        escape_html(&r.requester),
        escape_html(&r.task),
        escape_html(if r.location.is_empty() { "-" } else { r.location.as_str() }),
        escape_html(&r.vehicle),
        r.headcount,
        escape_html(&codec::encode(&r.equipment)),
        format_timestamp(r.span.start),
        format_timestamp(r.span.end),
    )
}

/// Human-readable message for the outbound channel. User-supplied text is escaped.
pub fn render_message(event: &Event) -> String {
    match event {
        Event::ReservationCreated { reservation } => {
            format!("<b>New reservation</b>\n{}", reservation_lines(reservation))
        }
        Event::ReservationUpdated {
            previous,
            reservation,
        } => format!(
            "<b>Reservation updated</b>\n{}\n<i>was {} from {} to {}</i>",
            reservation_lines(reservation),
            escape_html(&previous.vehicle),
            format_timestamp(previous.span.start),
            format_timestamp(previous.span.end),
        ),
        Event::ReservationCancelled { reservation } => {
            format!("<b>Reservation cancelled</b>\n{}", reservation_lines(reservation))
        }
        Event::EquipmentUpserted { item } => format!(
            "<b>Equipment updated</b>\n{}: {} units, volume {}",
            escape_html(&item.name),
            item.total_qty,
            item.volume_score,
        ),
        Event::EquipmentRemoved { name } => {
            format!("<b>Equipment removed</b>\n{}", escape_html(name))
        }
        Event::UserRegistered { user } => format!(
            "<b>User registered</b>\n{} <i>{}</i>",
            escape_html(&user.name),
            escape_html(&user.department),
        ),
    }
}
