//! Mail collaborator contract and deadline notices.
//!
//! Mail is best-effort. The engine only describes what should be sent as a
//! [`MailNotice`]; the [`crate::dispatch::Dispatcher`] hands it to a
//! [`Mailer`] on a background task and logs failures.
//!
//! Each notice carries an iCalendar invite for the task deadline so the
//! assignee's calendar picks it up.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};

use crate::model::Task;

/// Product identifier written into calendar invites.
const ICS_PRODID: &str = "-//Opsboard//Missions v1.0//EN";

/// Domain used to build globally unique invite UIDs.
const ICS_UID_DOMAIN: &str = "opsboard.local";

/// Errors a mail transport can report.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// The transport refused or failed to deliver.
    #[error("mail transport failed: {0}")]
    Transport(String),
    /// The recipient address is unusable.
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),
}

/// Why a notice is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// A mission was just assigned.
    Assigned,
    /// A mission is due within the reminder window.
    DeadlineWarning,
}

/// A deadline notice addressed to one operative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailNotice {
    /// Recipient address.
    pub to: String,
    pub kind: NoticeKind,
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// `text/calendar` attachment content.
    pub calendar: String,
}

impl MailNotice {
    /// Notice sent when a mission is assigned.
    #[must_use]
    pub fn assigned(to: impl Into<String>, task: &Task, now: DateTime<Utc>) -> Self {
        let summary = format!("Mission Deadline: {}", task.title());
        Self {
            to: to.into(),
            kind: NoticeKind::Assigned,
            subject: format!("New Mission Assigned: {}", task.title()),
            body: format!(
                "You have received a new assignment: {}.\nTarget Completion: {}",
                task.title(),
                task.deadline().format("%Y-%m-%d %H:%M UTC")
            ),
            calendar: calendar_invite(task, &summary, task.description(), now),
        }
    }

    /// Reminder sent by the deadline sweep that looked `window` ahead.
    #[must_use]
    pub fn deadline_warning(
        to: impl Into<String>,
        task: &Task,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let summary = format!("[DEADLINE WARNING] Due Soon: {}", task.title());
        let description = format!(
            "This is a reminder that your task is due in less than {}. Please prioritize.",
            window_text(window)
        );
        Self {
            to: to.into(),
            kind: NoticeKind::DeadlineWarning,
            subject: summary.clone(),
            body: format!(
                "{description}\nDeadline: {}",
                task.deadline().format("%Y-%m-%d %H:%M UTC")
            ),
            calendar: calendar_invite(task, &summary, &description, now),
        }
    }
}

fn window_text(window: Duration) -> String {
    match window.num_hours() {
        1 => "1 hour".to_string(),
        h if h > 1 => format!("{h} hours"),
        _ => format!("{} minutes", window.num_minutes()),
    }
}

/// Outbound mail transport.
pub trait Mailer: Send + Sync + 'static {
    /// Sends one notice.
    fn send(&self, notice: &MailNotice) -> impl Future<Output = Result<(), MailError>> + Send;
}

/// Mailer that only records notices in the log.
///
/// Used when no transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    async fn send(&self, notice: &MailNotice) -> Result<(), MailError> {
        if !notice.to.contains('@') {
            return Err(MailError::InvalidRecipient(notice.to.clone()));
        }
        tracing::info!(
            to = %notice.to,
            kind = ?notice.kind,
            subject = %notice.subject,
            "mail notice (log transport)"
        );
        Ok(())
    }
}

/// Renders an iCalendar `VEVENT` request for the task deadline.
///
/// Lines are CRLF-terminated as RFC 5545 requires; text values are
/// escaped.
#[must_use]
pub fn calendar_invite(task: &Task, summary: &str, description: &str, stamp: DateTime<Utc>) -> String {
    let deadline = ics_timestamp(task.deadline());
    [
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{ICS_PRODID}"),
        "METHOD:REQUEST".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}@{ICS_UID_DOMAIN}", task.id()),
        format!("DTSTAMP:{}", ics_timestamp(stamp)),
        format!("DTSTART:{deadline}"),
        format!("DTEND:{deadline}"),
        format!("SUMMARY:{}", escape_text(summary)),
        format!("DESCRIPTION:{}", escape_text(description)),
        "STATUS:CONFIRMED".to_string(),
        "END:VEVENT".to_string(),
        "END:VCALENDAR".to_string(),
    ]
    .join("\r\n")
}

fn ics_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}
