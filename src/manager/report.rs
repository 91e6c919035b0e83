//! Session report rendering for e-mail delivery.

use crate::manager::result_error::result::Result;
use crate::manager::session::{LevelCount, LogLevel, SessionLog};
use getset::Getters;
use lettre::message::Mailbox;
use serde::Serialize;
use tera::{Context, Tera};

static TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Session data exposed to the report template: a preamble line, the
/// per-level summary, and the records above the recipient group's level.
#[derive(Debug, Serialize)]
pub struct ReportData {
    preamble: String,
    summary: Vec<LevelCount>,
    records: Vec<RecordView>,
}

#[derive(Debug, Serialize)]
struct RecordView {
    time: String,
    level: LogLevel,
    message: String,
}

impl ReportData {
    pub fn from_session<S: Into<String>>(
        preamble: S,
        session: &SessionLog,
        level: LogLevel,
    ) -> ReportData {
        ReportData {
            preamble: preamble.into(),
            summary: session.summary(),
            records: session
                .at_or_above(level)
                .into_iter()
                .map(|record| RecordView {
                    time: record.time().format(TIME_FORMAT).to_string(),
                    level: *record.level(),
                    message: record.message().clone(),
                })
                .collect(),
        }
    }
}

/// An e-mail report under construction.
#[derive(Debug, Getters)]
#[getset(get = "pub")]
pub struct MailMessage {
    sender: Mailbox,
    recipients: Vec<Mailbox>,
    subject: String,
    content: String,
}

impl MailMessage {
    pub fn new(sender: Mailbox) -> MailMessage {
        MailMessage {
            sender,
            recipients: Vec::new(),
            subject: String::new(),
            content: String::new(),
        }
    }

    pub fn add_recipients(&mut self, recipients: &[Mailbox]) {
        self.recipients.extend_from_slice(recipients);
    }

    /// Derive the message subject from a context description.
    pub fn set_context(&mut self, context: &str) {
        self.subject = format!(
            "{} alert from {}: {}",
            env!("CARGO_PKG_NAME"),
            local_hostname(),
            context
        );
    }

    /// Render the report template over the session data and append the
    /// result to the message body. Record messages are HTML-escaped.
    pub fn add_templated_report(&mut self, template: Option<&str>, data: &ReportData) -> Result<()> {
        let rendered = Tera::one_off(
            template.unwrap_or(DEFAULT_TEMPLATE),
            &Context::from_serialize(data)?,
            true,
        )?;

        self.content.push_str(&rendered);

        Ok(())
    }
}

fn local_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown-host".to_string())
}

/// Built-in report template, used when the configuration does not supply one.
static DEFAULT_TEMPLATE: &str = r#"
<html>

<head>
    <style>
        .code {
            font-family: monospace;
            white-space: pre;
            vertical-align: baseline;
            text-align: left;
        }

        .debug {
            color: darkgray;
            display: table-row;
        }

        .info {
            color: steelblue;
            display: table-row;
        }

        .notice {
            color: seagreen;
            display: table-row;
        }

        .warning {
            color: orange;
            display: table-row;
        }

        .error {
            color: darkred;
            display: table-row;
        }

        .critical {
            color: darkorchid;
            display: table-row;
        }

    </style>

</head>

<body>

<div>{{ preamble }}</div>

<h2>Log Summary</h2>
<table>
    {% for bin in summary %}
    <tr class="code {{ bin.level }}">
        <th>Messages at level {{ bin.level }}</th>
        <td>{{ bin.count }}</td>
    </tr>
    {% endfor %}
</table>

<h2>Log Records</h2>
<table>
<tr>
    <th>Time</th>
    <th>Level</th>
    <th>Message</th>
</tr>
{% for record in records %}
<tr class="code {{ record.level }}">
    <td>{{ record.time }}</td>
    <td>{{ record.level }}</td>
    <td>{{ record.message }}</td>
</tr>
{% endfor %}
</table>

</body>

</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> SessionLog {
        let mut session = SessionLog::new();
        session.record(LogLevel::Debug, "Debug message");
        session.record(LogLevel::Info, "Info message");
        session.record(LogLevel::Notice, "Notice message");
        session.record(LogLevel::Warning, "Warning message");
        session.record(LogLevel::Error, "Error message");
        session.record(LogLevel::Critical, "Critical message");
        session
    }

    #[test]
    fn test_default_template_renders() {
        let session = sample_session();
        let data = ReportData::from_session("Preamble", &session, LogLevel::Debug);

        let sender = "warden@example.com".parse::<Mailbox>().unwrap();
        let mut message = MailMessage::new(sender);
        message.add_templated_report(None, &data).unwrap();

        let content = message.content();
        assert!(content.contains("Preamble"));
        assert!(content.contains("Messages at level critical"));
        assert!(content.contains("Error message"));
        assert!(content.contains("class=\"code warning\""));
    }

    #[test]
    fn test_report_respects_level_filter() {
        let session = sample_session();
        let data = ReportData::from_session("", &session, LogLevel::Error);

        let sender = "warden@example.com".parse::<Mailbox>().unwrap();
        let mut message = MailMessage::new(sender);
        message.add_templated_report(None, &data).unwrap();

        let content = message.content();
        // The summary table still counts every level...
        assert!(content.contains("Messages at level debug"));
        // ...but only error-and-above records are listed.
        assert!(content.contains("Error message"));
        assert!(content.contains("Critical message"));
        assert!(!content.contains("<td>Info message</td>"));
    }

    #[test]
    fn test_record_content_is_escaped() {
        let mut session = SessionLog::new();
        session.record(LogLevel::Error, "<script>alert(1)</script>");
        let data = ReportData::from_session("", &session, LogLevel::Debug);

        let sender = "warden@example.com".parse::<Mailbox>().unwrap();
        let mut message = MailMessage::new(sender);
        message.add_templated_report(None, &data).unwrap();

        assert!(!message.content().contains("<script>"));
        assert!(message.content().contains("&lt;script&gt;"));
    }

    #[test]
    fn test_custom_template_override() {
        let session = sample_session();
        let data = ReportData::from_session("hello", &session, LogLevel::Debug);

        let sender = "warden@example.com".parse::<Mailbox>().unwrap();
        let mut message = MailMessage::new(sender);
        message
            .add_templated_report(Some("<p>{{ preamble }}</p>"), &data)
            .unwrap();

        assert_eq!(message.content(), "<p>hello</p>");
    }

    #[test]
    fn test_invalid_template_is_an_error() {
        let session = SessionLog::new();
        let data = ReportData::from_session("", &session, LogLevel::Debug);

        let sender = "warden@example.com".parse::<Mailbox>().unwrap();
        let mut message = MailMessage::new(sender);
        assert!(message
            .add_templated_report(Some("{% for x in %}"), &data)
            .is_err());
    }

    #[test]
    fn test_subject_carries_context() {
        let sender = "warden@example.com".parse::<Mailbox>().unwrap();
        let mut message = MailMessage::new(sender);
        message.set_context("Performing automatic management of profile home");

        assert!(message.subject().contains("alert from"));
        assert!(message
            .subject()
            .ends_with("Performing automatic management of profile home"));
    }

    #[test]
    fn test_recipients_accumulate() {
        let sender = "warden@example.com".parse::<Mailbox>().unwrap();
        let mut message = MailMessage::new(sender);
        message.add_recipients(&["a@example.com".parse().unwrap()]);
        message.add_recipients(&["b@example.com".parse().unwrap()]);

        assert_eq!(message.recipients().len(), 2);
    }
}
