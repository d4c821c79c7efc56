/// Mail transports
///
/// A [`Mailer`] delivers one rendered [`Message`]. Template markup and SMTP
/// live behind the relay; this crate only decides who gets which template
/// with which fields.
///
/// - [`LogMailer`]: writes messages to the log (development default)
/// - [`HttpMailer`]: POSTs messages as JSON to a mail relay
/// - [`MemoryMailer`]: records messages in memory, optionally failing

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use super::{NotifyError, Template};

/// A rendered notification ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub to: String,
    pub template: Template,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Transport name for logs
    fn name(&self) -> &'static str;

    async fn send(&self, message: &Message) -> Result<(), NotifyError>;
}

/// Logs messages instead of sending them
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &Message) -> Result<(), NotifyError> {
        tracing::info!(
            to = %message.to,
            template = message.template.as_str(),
            subject = %message.subject,
            "Mail not sent (log transport)"
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    #[serde(flatten)]
    message: &'a Message,
}

/// Sends messages to an HTTP mail relay
///
/// The relay receives `{from, to, template, subject, body}` and must answer
/// with a 2xx status.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    relay_url: String,
    from: String,
    timeout: Duration,
}

impl HttpMailer {
    pub fn new(relay_url: impl Into<String>, from: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            relay_url: relay_url.into(),
            from: from.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, message: &Message) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.relay_url)
            .timeout(self.timeout)
            .json(&RelayRequest { from: &self.from, message })
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    NotifyError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    NotifyError::Transport(error.to_string())
                }
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(NotifyError::Rejected(format!("HTTP {}", response.status())))
        }
    }
}

/// Records messages in memory
///
/// Used by tests to assert on what would have been sent. While failing is
/// switched on, every send returns an error and nothing is recorded.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<Message>>,
    failing: AtomicBool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<Message> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_to(&self, address: &str) -> Vec<Message> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.to == address)
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn send(&self, message: &Message) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("memory mailer set to fail".to_string()));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> Message {
        Message {
            to: "bob@example.com".to_string(),
            template: Template::TaskAssigned,
            subject: "New task".to_string(),
            body: "Body".to_string(),
        }
    }

    #[tokio::test]
    async fn test_memory_mailer_records() {
        let mailer = MemoryMailer::new();
        mailer.send(&message()).await.unwrap();

        assert_eq!(mailer.sent().await.len(), 1);
        assert_eq!(mailer.sent_to("bob@example.com").await.len(), 1);
        assert!(mailer.sent_to("alice@example.com").await.is_empty());
    }

    #[tokio::test]
    async fn test_memory_mailer_failing() {
        let mailer = MemoryMailer::new();
        mailer.set_failing(true);

        assert!(mailer.send(&message()).await.is_err());
        assert!(mailer.sent().await.is_empty());

        mailer.set_failing(false);
        assert!(mailer.send(&message()).await.is_ok());
    }

    #[tokio::test]
    async fn test_http_mailer_unreachable_relay() {
        // TEST-NET-1, never routable
        let mailer = HttpMailer::new("http://192.0.2.1/send", "noreply@example.com", Duration::from_millis(200));
        assert!(mailer.send(&message()).await.is_err());
    }

    #[test]
    fn test_relay_request_shape() {
        let message = message();
        let json = serde_json::to_value(RelayRequest { from: "noreply@example.com", message: &message }).unwrap();

        assert_eq!(json["from"], "noreply@example.com");
        assert_eq!(json["to"], "bob@example.com");
        assert_eq!(json["template"], "task_assigned");
    }
}
