//! Notification gateway
//!
//! Renders the three idea notifications as HTML mail and hands them to a
//! delivery backend. Callers treat every failure as non-fatal.

use crate::config::MailConfig;
use crate::db::models::{Idea, IdeaStatus};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

const SITE_NAME: &str = "Лаборатория идей";
const ESSENCE_PREVIEW_CHARS: usize = 300;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Invalid mail address {address:?}: {message}")]
    Address { address: String, message: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Mail transport failed: {0}")]
    Transport(String),
}

/// What happened to a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// No recipient address is known
    Skipped,
}

impl Delivery {
    pub fn as_str(&self) -> &'static str {
        match self {
            Delivery::Sent => "sent",
            Delivery::Skipped => "skipped",
        }
    }
}

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Notification gateway.
///
/// Implementors only provide delivery; the three notifications are
/// rendered by the provided methods.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, email: OutgoingEmail) -> Result<(), NotifyError>;

    /// Address that receives new-idea notices
    fn moderator_address(&self) -> Option<String>;

    /// Tell moderators a new idea is waiting for review
    async fn notify_new_idea(&self, idea: &Idea) -> Result<Delivery, NotifyError> {
        let Some(to) = self.moderator_address() else {
            debug!(idea_id = idea.id, "No moderator address configured, skipping");
            return Ok(Delivery::Skipped);
        };
        self.deliver(render_new_idea(idea, to)).await?;
        Ok(Delivery::Sent)
    }

    /// Confirm receipt to the author, if they left an address
    async fn notify_author_confirmation(&self, idea: &Idea) -> Result<Delivery, NotifyError> {
        let Some(to) = author_address(idea) else {
            debug!(idea_id = idea.id, "No author email, skipping confirmation");
            return Ok(Delivery::Skipped);
        };
        self.deliver(render_author_confirmation(idea, to)).await?;
        Ok(Delivery::Sent)
    }

    /// Tell the author their idea changed status
    async fn notify_status_change(
        &self,
        idea: &Idea,
        old_status: IdeaStatus,
        new_status: IdeaStatus,
    ) -> Result<Delivery, NotifyError> {
        let Some(to) = author_address(idea) else {
            debug!(idea_id = idea.id, "No author email, skipping status notice");
            return Ok(Delivery::Skipped);
        };
        self.deliver(render_status_change(idea, old_status, new_status, to))
            .await?;
        Ok(Delivery::Sent)
    }
}

fn author_address(idea: &Idea) -> Option<String> {
    idea.contact_email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(String::from)
}

// ============================================================================
// Rendering
// ============================================================================

/// Escape text for HTML and turn line breaks into `<br>`
fn html_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.replace("\r\n", "\n").chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\n' | '\r' => out.push_str("<br>"),
            _ => out.push(c),
        }
    }
    out
}

fn preview(text: &str) -> String {
    if text.chars().count() > ESSENCE_PREVIEW_CHARS {
        let cut: String = text.chars().take(ESSENCE_PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

fn page(accent: &str, heading: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: Arial, sans-serif; line-height: 1.5; color: #333;">
<div style="max-width: 600px; margin: 0 auto; border: 1px solid #ddd;">
<div style="background: {accent}; color: white; padding: 20px; text-align: center;">
<h1>{heading}</h1>
<p>{site}</p>
</div>
<div style="padding: 20px;">
{body}
</div>
<div style="text-align: center; padding: 15px; background: #f8f9fa; font-size: 12px; color: #666;">
<p><strong>{site}</strong></p>
<p>Система автоматических уведомлений</p>
</div>
</div>
</body>
</html>"#,
        accent = accent,
        heading = heading,
        body = body,
        site = SITE_NAME,
    )
}

pub fn render_new_idea(idea: &Idea, to: String) -> OutgoingEmail {
    let body = format!(
        "<h2>Поступила новая идея для рассмотрения</h2>\
         <h3>{title}</h3>\
         <p><strong>Категория:</strong> {category}</p>\
         <p><strong>Автор:</strong> {author}</p>\
         <p><strong>Дата подачи:</strong> {date}</p>\
         <p><strong>ID идеи:</strong> #{id}</p>\
         <p><strong>Суть предложения:</strong><br>{essence}</p>\
         <p>Пожалуйста, зайдите в систему для рассмотрения новой идеи.</p>",
        title = html_text(&idea.title),
        category = html_text(&idea.category),
        author = html_text(idea.author_name.as_deref().unwrap_or("Аноним")),
        date = idea.created_at.format("%d.%m.%Y %H:%M"),
        id = idea.id,
        essence = html_text(&preview(&idea.essence)),
    );

    OutgoingEmail {
        to,
        subject: format!("Новая идея в системе: #{}", idea.id),
        html: page("#14427a", "Новая идея в системе", &body),
    }
}

pub fn render_author_confirmation(idea: &Idea, to: String) -> OutgoingEmail {
    let body = format!(
        "<h2>Спасибо за вашу идею!</h2>\
         <p>Ваша идея <strong>\"{title}\"</strong> принята и передана модераторам.</p>\
         <p><strong>Номер заявки:</strong> #{id}</p>\
         <p><strong>Категория:</strong> {category}</p>\
         <p><strong>Текущий статус:</strong> {status}</p>\
         <p><strong>Суть предложения:</strong><br>{essence}</p>\
         <p>Мы сообщим вам об изменении статуса.</p>",
        title = html_text(&idea.title),
        id = idea.id,
        category = html_text(&idea.category),
        status = idea.status.label(),
        essence = html_text(&preview(&idea.essence)),
    );

    OutgoingEmail {
        to,
        subject: format!("Ваша идея принята: #{}", idea.id),
        html: page("#28a745", "Идея успешно отправлена", &body),
    }
}

fn status_accent(status: IdeaStatus) -> &'static str {
    match status {
        IdeaStatus::Approved => "#28a745",
        IdeaStatus::PartiallyApproved => "#20c997",
        IdeaStatus::Rejected => "#dc3545",
        IdeaStatus::InProgress => "#0dcaf0",
        IdeaStatus::Implemented => "#6f42c1",
        IdeaStatus::Pending => "#6c757d",
    }
}

pub fn render_status_change(
    idea: &Idea,
    old_status: IdeaStatus,
    new_status: IdeaStatus,
    to: String,
) -> OutgoingEmail {
    let feedback = idea
        .moderator_feedback
        .as_deref()
        .filter(|text| !text.trim().is_empty())
        .map(|text| format!("<p><strong>Комментарий модератора:</strong><br>{}</p>", html_text(text)))
        .unwrap_or_default();

    let body = format!(
        "<h2>Статус вашей идеи обновлен</h2>\
         <p><strong>Идея:</strong> \"{title}\"</p>\
         <p><strong>Прежний статус:</strong> {old}</p>\
         <p><strong>Новый статус:</strong> <span style=\"color: {accent}; font-weight: bold;\">{new}</span></p>\
         <p><strong>Номер заявки:</strong> #{id}</p>\
         <p><strong>Категория:</strong> {category}</p>\
         <p><strong>Дата подачи:</strong> {date}</p>\
         {feedback}",
        title = html_text(&idea.title),
        old = old_status.label(),
        accent = status_accent(new_status),
        new = new_status.label(),
        id = idea.id,
        category = html_text(&idea.category),
        date = idea.created_at.format("%d.%m.%Y"),
        feedback = feedback,
    );

    OutgoingEmail {
        to,
        subject: format!("Статус идеи #{} изменен: {}", idea.id, new_status.label()),
        html: page(status_accent(new_status), "Статус вашей идеи изменен", &body),
    }
}

// ============================================================================
// Backends
// ============================================================================

/// Delivers over SMTP
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    moderator_email: Option<String>,
}

impl SmtpNotifier {
    pub fn new(config: &MailConfig) -> Result<Self, NotifyError> {
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| NotifyError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };

        let mut builder = builder.port(config.smtp_port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = parse_mailbox(&config.from_email)?;

        info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            starttls = config.starttls,
            "SMTP notifier configured"
        );

        Ok(Self {
            transport: builder.build(),
            from,
            moderator_email: config.moderator_email.clone(),
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|e: lettre::address::AddressError| NotifyError::Address {
        address: address.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn deliver(&self, email: OutgoingEmail) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&email.to)?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html)
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        info!(to = %email.to, subject = %email.subject, "Notification sent");
        Ok(())
    }

    fn moderator_address(&self) -> Option<String> {
        self.moderator_email.clone()
    }
}

/// Writes notifications to the log instead of sending them
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    moderator_email: Option<String>,
}

impl LogNotifier {
    pub fn new(moderator_email: Option<String>) -> Self {
        Self { moderator_email }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, email: OutgoingEmail) -> Result<(), NotifyError> {
        info!(to = %email.to, subject = %email.subject, "Mail disabled, notification logged only");
        Ok(())
    }

    fn moderator_address(&self) -> Option<String> {
        self.moderator_email.clone()
    }
}

/// Records notifications in memory; used by tests
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    moderator_email: Option<String>,
    fail: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self {
            moderator_email: Some("moderators@example.com".to_string()),
            ..Default::default()
        }
    }

    /// A notifier whose every delivery fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn deliver(&self, email: OutgoingEmail) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Transport("simulated outage".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email);
        }
        Ok(())
    }

    fn moderator_address(&self) -> Option<String> {
        self.moderator_email.clone()
    }
}

/// Pick the backend for the mail configuration
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    if config.enabled {
        Ok(Arc::new(SmtpNotifier::new(config)?))
    } else {
        Ok(Arc::new(LogNotifier::new(config.moderator_email.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn idea(contact_email: Option<&str>) -> Idea {
        Idea {
            id: 17,
            title: "Парковка <для> велосипедов".to_string(),
            essence: "Негде оставить велосипед\nу входа".to_string(),
            solution: "Поставить стойки".to_string(),
            description: None,
            author_name: None,
            contact_email: contact_email.map(String::from),
            category: "Общее".to_string(),
            is_published: false,
            status: IdeaStatus::Pending,
            moderator_feedback: Some("Хорошая идея".to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap(),
            search_text: String::new(),
        }
    }

    #[test]
    fn test_html_text_escapes_and_breaks_lines() {
        assert_eq!(html_text("a<b>\r\nc & d"), "a&lt;b&gt;<br>c &amp; d");
    }

    #[test]
    fn test_preview_truncates_by_chars() {
        let long = "ж".repeat(ESSENCE_PREVIEW_CHARS + 5);
        let cut = preview(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), ESSENCE_PREVIEW_CHARS + 3);
    }

    #[test]
    fn test_status_change_render() {
        let email = render_status_change(
            &idea(Some("a@example.com")),
            IdeaStatus::Pending,
            IdeaStatus::Approved,
            "a@example.com".to_string(),
        );
        assert_eq!(email.subject, "Статус идеи #17 изменен: Одобрено");
        assert!(email.html.contains("На рассмотрении"));
        assert!(email.html.contains("Хорошая идея"));
        assert!(email.html.contains("&lt;для&gt;"));
    }

    #[tokio::test]
    async fn test_author_mail_skipped_without_address() {
        let notifier = MemoryNotifier::new();
        let outcome = notifier.notify_author_confirmation(&idea(None)).await.unwrap();
        assert_eq!(outcome, Delivery::Skipped);

        let outcome = notifier
            .notify_status_change(&idea(Some("  ")), IdeaStatus::Pending, IdeaStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(outcome, Delivery::Skipped);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_new_idea_goes_to_moderators() {
        let notifier = MemoryNotifier::new();
        notifier.notify_new_idea(&idea(None)).await.unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "moderators@example.com");
        assert!(sent[0].html.contains("Аноним"));
    }

    #[tokio::test]
    async fn test_failing_notifier_reports_error() {
        let notifier = MemoryNotifier::failing();
        let result = notifier.notify_author_confirmation(&idea(Some("a@example.com"))).await;
        assert!(matches!(result, Err(NotifyError::Transport(_))));
    }

    #[tokio::test]
    async fn test_log_notifier_without_moderator_address() {
        let notifier = LogNotifier::new(None);
        assert_eq!(notifier.notify_new_idea(&idea(None)).await.unwrap(), Delivery::Skipped);
    }
}
