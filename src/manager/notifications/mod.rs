use crate::manager::notifications::smtp::SmtpNotificationConfig;
use crate::manager::result_error::result::Result;
use derive_more::From;
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};
use std::result;
use validator::{Validate, ValidationErrors};

pub mod smtp;

/// Transport used to deliver session reports.
///
/// Tagged so configuration reads as `type: smtp` plus the transport's own
/// fields; adding another delivery mechanism means adding an arm here.
#[derive(Clone, From, Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum NotificationConfig {
    Smtp(SmtpNotificationConfig),
}

impl Validate for NotificationConfig {
    fn validate(&self) -> result::Result<(), ValidationErrors> {
        match self {
            Self::Smtp(inner) => inner.validate(),
        }
    }
}

impl Notification for NotificationConfig {
    fn send(
        &self,
        sender: &Mailbox,
        recipients: &[Mailbox],
        subject: &str,
        html_body: &str,
    ) -> Result<()> {
        match self {
            Self::Smtp(inner) => inner.send(sender, recipients, subject, html_body),
        }
    }
}

pub trait Notification {
    fn send(
        &self,
        sender: &Mailbox,
        recipients: &[Mailbox],
        subject: &str,
        html_body: &str,
    ) -> Result<()>;
}
