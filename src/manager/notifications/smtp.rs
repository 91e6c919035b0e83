use crate::manager::function_path;
use crate::manager::notifications::Notification;
use crate::manager::result_error::error::Error;
use crate::manager::result_error::result::Result;
use crate::manager::result_error::{WithDebugObjectAndFnName, WithMsg};
use crate::manager::secret::Secret;
use bon::Builder;
use function_name::named;
use getset::Getters;
use itertools::Itertools;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// SMTP delivery configuration for session reports.
///
/// Credentials are stored in [`Secret`] so re-serialized configuration and
/// debug output never carry the password.
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct SmtpNotificationConfig {
    #[builder(into)]
    host: String,
    /// Explicit port; the transport's default for the mode otherwise.
    port: Option<u16>,
    smtp_mode: SmtpMode,
    #[builder(into)]
    username: String,
    #[builder(into)]
    password: Secret,
}

/// SMTP connection security modes
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SmtpMode {
    Unsecured,
    Ssl,
    StartTls,
}

impl Notification for SmtpNotificationConfig {
    #[named]
    fn send(
        &self,
        sender: &Mailbox,
        recipients: &[Mailbox],
        subject: &str,
        html_body: &str,
    ) -> Result<()> {
        tracing::info!(
            "Sending report from {:?} to {:?} via {}",
            sender,
            recipients,
            self.host
        );

        let email = recipients
            .iter()
            .fold(Message::builder(), |email, send_to| email.to(send_to.clone()))
            .from(sender.clone())
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(Error::from)
            .with_msg(format!(
                "Fail to build report email from {:?} to {:?}",
                sender, recipients
            ))
            .with_debug_object_and_fn_name(self.clone(), function_path!())?;

        let creds = Credentials::new(self.username.clone(), self.password.expose().to_string());

        let mut builder = match self.smtp_mode {
            SmtpMode::Unsecured => Ok(SmtpTransport::builder_dangerous(self.host.as_str())),
            SmtpMode::Ssl => SmtpTransport::relay(self.host.as_str()),
            SmtpMode::StartTls => SmtpTransport::starttls_relay(self.host.as_str()),
        }
        .map_err(Error::from)
        .with_msg(format!(
            "Failed to build smtp client for host: {:?} with mode {:?}",
            self.host, self.smtp_mode
        ))
        .with_debug_object_and_fn_name(self.clone(), function_path!())?;

        if let Some(port) = self.port {
            builder = builder.port(port);
        }

        let mailer = builder.credentials(creds).build();

        let response = mailer
            .send(&email)
            .map_err(Error::from)
            .with_debug_object_and_fn_name(self.clone(), function_path!())?;
        if response.is_positive() {
            Ok(())
        } else {
            let mut error_vec = response
                .message()
                .map(|m| Error::SmtpSend(m.to_owned()))
                .collect_vec();
            if error_vec.is_empty() {
                error_vec.push(Error::SmtpSend(format!("{:?}", response.code())));
            }
            Err(Error::from(error_vec))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(any(target_os = "macos", target_os = "ios")))]
    fn test_smtp_send() {
        use std::env;

        // Skip if running in CI or without network
        if env::var("CI").is_ok() {
            return;
        }

        let server = maik::MockServer::builder().no_verify_credentials().build();

        let config = SmtpNotificationConfig::builder()
            .host(format!("{}:{}", server.host(), server.port()))
            .smtp_mode(SmtpMode::Unsecured)
            .username("testuser")
            .password("testpass")
            .build();

        server.start();
        std::thread::sleep(std::time::Duration::from_millis(100));

        let sender = "warden@example.com".parse::<Mailbox>().unwrap();
        let recipients = vec!["operator@example.com".parse::<Mailbox>().unwrap()];
        let result = config.send(&sender, &recipients, "Test Subject", "<p>report</p>");

        std::thread::sleep(std::time::Duration::from_millis(200));

        if result.is_ok() {
            let assertion = maik::MailAssertion::new().recipients_are(["operator@example.com"]);
            assert!(server.assert(assertion));
        }
    }

    #[test]
    fn test_smtp_config_deserialization() {
        let yaml = r#"
host: mail.example.com
port: 587
smtp_mode: StartTls
username: warden
password: not-a-real-password
"#;
        let config: SmtpNotificationConfig = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.host(), "mail.example.com");
        assert_eq!(*config.port(), Some(587));
        assert_eq!(*config.smtp_mode(), SmtpMode::StartTls);

        // Password must not survive re-serialization.
        let round_trip = serde_yml::to_string(&config).unwrap();
        assert!(!round_trip.contains("not-a-real-password"));
    }

    #[test]
    fn test_smtp_mode_serialization() {
        let modes = vec![
            (SmtpMode::Unsecured, "\"Unsecured\""),
            (SmtpMode::Ssl, "\"Ssl\""),
            (SmtpMode::StartTls, "\"StartTls\""),
        ];

        for (mode, expected) in modes {
            let serialized = serde_json::to_string(&mode).unwrap();
            assert_eq!(serialized, expected);
            let deserialized: SmtpMode = serde_json::from_str(&serialized).unwrap();
            assert_eq!(deserialized, mode);
        }
    }
}
