//! Notification mail
//!
//! Mail is best effort: a failure to notify is logged, never propagated.

use crate::core::config::MailConfig;
use crate::core::error::{PrereleaseError, PrereleaseResult, ResultExt};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

pub trait Mailer {
  fn send(&self, from: &str, to: &[String], subject: &str, body: &str) -> PrereleaseResult<()>;
}

/// Pipes an RFC 822 message into `sendmail -t`
#[derive(Debug, Clone)]
pub struct SendmailMailer {
  sendmail: PathBuf,
}

impl SendmailMailer {
  pub fn new(sendmail: impl Into<PathBuf>) -> Self {
    Self {
      sendmail: sendmail.into(),
    }
  }
}

pub fn format_message(from: &str, to: &[String], subject: &str, body: &str) -> String {
  format!(
    "From: {}\nTo: {}\nSubject: {}\nContent-Type: text/plain; charset=UTF-8\n\n{}\n",
    from,
    to.join(", "),
    subject.replace('\n', " "),
    body
  )
}

impl Mailer for SendmailMailer {
  fn send(&self, from: &str, to: &[String], subject: &str, body: &str) -> PrereleaseResult<()> {
    let mut child = Command::new(&self.sendmail)
      .arg("-t")
      .stdin(Stdio::piped())
      .stdout(Stdio::null())
      .stderr(Stdio::piped())
      .spawn()
      .with_context(|| format!("Failed to run {}", self.sendmail.display()))?;
    if let Some(stdin) = child.stdin.as_mut() {
      stdin.write_all(format_message(from, to, subject, body).as_bytes())?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
      return Err(PrereleaseError::message(format!(
        "{} failed: {}",
        self.sendmail.display(),
        String::from_utf8_lossy(&output.stderr).trim()
      )));
    }
    Ok(())
  }
}

/// Writes the mail to the log instead of sending it
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
  fn send(&self, _from: &str, to: &[String], subject: &str, body: &str) -> PrereleaseResult<()> {
    tracing::info!(to = ?to, subject, body, "notification (mail not configured)");
    Ok(())
  }
}

/// Mailer plus sender and recipients
pub struct Notifier {
  mailer: Box<dyn Mailer>,
  from: String,
  to: Vec<String>,
}

impl Notifier {
  pub fn new(mailer: Box<dyn Mailer>, from: impl Into<String>, to: Vec<String>) -> Self {
    Self {
      mailer,
      from: from.into(),
      to,
    }
  }

  pub fn from_config(mail: Option<&MailConfig>) -> Self {
    match mail {
      Some(mail) => Self::new(
        Box::new(SendmailMailer::new(&mail.sendmail)),
        &mail.from,
        mail.to.clone(),
      ),
      None => Self::new(Box::new(LogMailer), "prerelease", Vec::new()),
    }
  }

  /// Send, logging instead of failing
  pub fn notify(&self, subject: &str, body: &str) {
    if let Err(e) = self.mailer.send(&self.from, &self.to, subject, body) {
      tracing::warn!(error = %e, subject, "cannot send notification");
    }
  }
}
