//! Notifier variants used to announce pre-delivered units to a consumer's
//! external owner.
//!
//! A notifier receives the amount currently buffered for its consumer and
//! answers with the amount it actually took; the engine then removes exactly
//! that take from the consumer buffer. The [`Notifier`] wrapper carries the
//! per-instance exclusion scope: while one notification is in flight, no
//! second one for the same notifier begins.

use crate::event::Event;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

/// Deadline applied to every outbound http-post notification.
const HTTP_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Error types for notification delivery.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The notifier endpoint answered outside the 2xx range.
    #[error("notifier endpoint returned status {0}")]
    Status(u16),
    /// Transport-layer error (connect, timeout, TLS).
    #[error("notifier transport error: {0}")]
    Transport(String),
    /// The endpoint's answer did not carry a readable take amount.
    #[error("malformed notifier response: {0}")]
    MalformedResponse(String),
    /// The admin surface asked for a notifier type that does not exist.
    #[error("unknown notifier type: {0}")]
    UnknownType(String),
    /// The supplied notifier config is missing or invalid.
    #[error("invalid notifier config: {0}")]
    InvalidConfig(String),
}

/// Capability of announcing buffered units to a consumer's owner.
///
/// Uses native async fn in traits; for dynamic dispatch use [`NotifyBoxed`].
pub trait Notify: Send + Sync {
    /// Announces `amount` buffered units for `consumer_id` and returns the
    /// amount the owner actually took.
    fn notify(
        &self,
        amount: u64,
        consumer_id: &str,
    ) -> impl Future<Output = Result<u64, NotifyError>> + Send;

    /// Returns the notifier type tag for logging and the admin surface.
    fn kind(&self) -> &str;
}

/// Object-safe version of [`Notify`] for dynamic dispatch.
pub trait NotifyBoxed: Send + Sync {
    /// Announces buffered units (boxed future for object safety).
    fn notify_boxed<'a>(
        &'a self,
        amount: u64,
        consumer_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u64, NotifyError>> + Send + 'a>>;

    /// Returns the notifier type tag.
    fn kind(&self) -> &str;
}

/// Blanket implementation: any [`Notify`] can be used as [`NotifyBoxed`].
impl<T: Notify> NotifyBoxed for T {
    fn notify_boxed<'a>(
        &'a self,
        amount: u64,
        consumer_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u64, NotifyError>> + Send + 'a>> {
        Box::pin(self.notify(amount, consumer_id))
    }

    fn kind(&self) -> &str {
        Notify::kind(self)
    }
}

/// A consumer's notifier: one [`Notify`] variant plus its exclusion scope.
pub struct Notifier {
    inner: Box<dyn NotifyBoxed>,
    exclusion: Mutex<()>,
}

impl Notifier {
    /// Wraps an arbitrary variant.
    pub fn new(inner: Box<dyn NotifyBoxed>) -> Self {
        Self {
            inner,
            exclusion: Mutex::new(()),
        }
    }

    /// Debug notifier: takes everything and logs the amounts.
    pub fn debug() -> Self {
        Self::new(Box::new(DebugNotifier))
    }

    /// Event-signal notifier: wakes the waiting stream handler, which pulls
    /// on its own schedule.
    pub fn event(event: Arc<Event>) -> Self {
        Self::new(Box::new(EventNotifier { event }))
    }

    /// The exclusion scope; hold its guard for the whole read-notify-remove
    /// sequence so notifications for this notifier serialise.
    pub fn exclusion(&self) -> &Mutex<()> {
        &self.exclusion
    }

    /// Delegates to the wrapped variant. Callers are expected to hold the
    /// exclusion guard.
    pub async fn notify(&self, amount: u64, consumer_id: &str) -> Result<u64, NotifyError> {
        self.inner.notify_boxed(amount, consumer_id).await
    }

    /// The wrapped variant's type tag.
    pub fn kind(&self) -> &str {
        self.inner.kind()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").field("kind", &self.kind()).finish()
    }
}

/// Builds a notifier from an admin-supplied type tag and JSON config.
///
/// The event-signal variant is not listed here: it exists only for
/// stream-registered consumers and cannot be requested over the admin
/// surface.
pub fn notifier_from_tag(tag: &str, config: &Value) -> Result<Notifier, NotifyError> {
    match tag {
        "debug" => Ok(Notifier::debug()),
        "http-post" => Ok(Notifier::new(Box::new(HttpPostNotifier::from_config(config)?))),
        other => Err(NotifyError::UnknownType(other.to_string())),
    }
}

/// Takes everything and logs what it took. Used for debugging setups.
pub struct DebugNotifier;

impl Notify for DebugNotifier {
    async fn notify(&self, amount: u64, consumer_id: &str) -> Result<u64, NotifyError> {
        info!(consumer = consumer_id, amount, "debug notifier consumed units");
        Ok(amount)
    }

    fn kind(&self) -> &str {
        "debug"
    }
}

/// Wakes a level-triggered event; the awakened stream handler pulls from the
/// buffers itself, so the notification path takes nothing.
pub struct EventNotifier {
    event: Arc<Event>,
}

impl Notify for EventNotifier {
    async fn notify(&self, _amount: u64, _consumer_id: &str) -> Result<u64, NotifyError> {
        self.event.set();
        Ok(0)
    }

    fn kind(&self) -> &str {
        "event"
    }
}

/// Payload format for the http-post request body and response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFormat {
    Json,
    Text,
}

impl BodyFormat {
    fn parse(value: &str) -> Result<Self, NotifyError> {
        match value {
            "application/json" => Ok(Self::Json),
            "text/plain" => Ok(Self::Text),
            other => Err(NotifyError::InvalidConfig(format!(
                "unsupported media type: {other}"
            ))),
        }
    }
}

/// POSTs the available amount to a configured URL; the response body carries
/// the amount taken.
///
/// `{{ consumer_id }}` in the URL is substituted at call time. A non-2xx
/// answer fails the current notification; the consumer buffer is left intact
/// and the next notification retries.
pub struct HttpPostNotifier {
    client: reqwest::Client,
    url: String,
    content_type: BodyFormat,
    accept: BodyFormat,
}

impl HttpPostNotifier {
    /// Builds the notifier from an admin-supplied JSON config:
    /// `{ "url": <string>, "content_type"?: <media type>, "accept"?: <media type> }`.
    pub fn from_config(config: &Value) -> Result<Self, NotifyError> {
        let url = config
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| NotifyError::InvalidConfig("missing url".to_string()))?
            .to_string();

        let content_type = match config.get("content_type").and_then(Value::as_str) {
            Some(value) => BodyFormat::parse(value)?,
            None => BodyFormat::Json,
        };
        let accept = match config.get("accept").and_then(Value::as_str) {
            Some(value) => BodyFormat::parse(value)?,
            None => BodyFormat::Json,
        };

        let client = reqwest::Client::builder()
            .timeout(HTTP_NOTIFY_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url,
            content_type,
            accept,
        })
    }

    fn target_url(&self, consumer_id: &str) -> String {
        self.url
            .replace("{{ consumer_id }}", consumer_id)
            .replace("{{consumer_id}}", consumer_id)
    }
}

impl Notify for HttpPostNotifier {
    async fn notify(&self, amount: u64, consumer_id: &str) -> Result<u64, NotifyError> {
        let request = self.client.post(self.target_url(consumer_id));

        let request = match self.content_type {
            BodyFormat::Json => request.json(&serde_json::json!({
                "consumer_id": consumer_id,
                "amount": amount,
            })),
            BodyFormat::Text => request
                .header(reqwest::header::CONTENT_TYPE, "text/plain")
                .body(amount.to_string()),
        };
        let request = request.header(
            reqwest::header::ACCEPT,
            match self.accept {
                BodyFormat::Json => "application/json",
                BodyFormat::Text => "text/plain",
            },
        );

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        match self.accept {
            BodyFormat::Json => parse_json_take(&body),
            BodyFormat::Text => body
                .trim()
                .parse::<u64>()
                .map_err(|_| NotifyError::MalformedResponse(body.clone())),
        }
    }

    fn kind(&self) -> &str {
        "http-post"
    }
}

/// Accepts either a bare number or an `{"amount": <n>}` object.
fn parse_json_take(body: &str) -> Result<u64, NotifyError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|_| NotifyError::MalformedResponse(body.to_string()))?;
    let taken = match &value {
        Value::Number(n) => n.as_u64(),
        Value::Object(map) => map.get("amount").and_then(Value::as_u64),
        _ => None,
    };
    taken.ok_or_else(|| NotifyError::MalformedResponse(body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn debug_notifier_takes_everything() {
        let notifier = Notifier::debug();
        assert_eq!(notifier.notify(42, "c1").await.unwrap(), 42);
        assert_eq!(notifier.kind(), "debug");
    }

    #[tokio::test]
    async fn event_notifier_takes_nothing_and_signals() {
        let event = Arc::new(Event::new());
        let notifier = Notifier::event(Arc::clone(&event));
        assert!(!event.is_set());
        assert_eq!(notifier.notify(10, "c1").await.unwrap(), 0);
        assert!(event.is_set());
    }

    #[test]
    fn factory_rejects_unknown_tags() {
        let err = notifier_from_tag("carrier-pigeon", &Value::Null).unwrap_err();
        assert!(matches!(err, NotifyError::UnknownType(_)));
    }

    #[test]
    fn http_post_requires_a_url() {
        let err = notifier_from_tag("http-post", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, NotifyError::InvalidConfig(_)));
    }

    #[test]
    fn http_post_rejects_unsupported_media_types() {
        let config = serde_json::json!({
            "url": "http://localhost/notify",
            "content_type": "application/xml",
        });
        let err = notifier_from_tag("http-post", &config).unwrap_err();
        assert!(matches!(err, NotifyError::InvalidConfig(_)));
    }

    #[test]
    fn url_template_substitutes_consumer_id() {
        let config = serde_json::json!({ "url": "http://host/consumers/{{ consumer_id }}/notify" });
        let notifier = HttpPostNotifier::from_config(&config).unwrap();
        assert_eq!(
            notifier.target_url("c-7"),
            "http://host/consumers/c-7/notify"
        );
    }

    #[test]
    fn json_take_accepts_object_and_bare_number() {
        assert_eq!(parse_json_take("17").unwrap(), 17);
        assert_eq!(parse_json_take("{\"amount\": 9}").unwrap(), 9);
        assert!(parse_json_take("\"nine\"").is_err());
    }
}
