//! Completion notifications.
//!
//! A requester who left an address hears back exactly once per pull, whether
//! it succeeded or not. Delivery is best-effort: failures are reported to the
//! caller, which logs them and moves on.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// How a pull or publish ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Available { uri: String, file_name: String, hash: String },
    Failed { uri: String, file_name: String, reason: String },
}
impl Outcome {
    pub fn uri(&self) -> &str {
        match self {
            Self::Available { uri, .. } | Self::Failed { uri, .. } => uri,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Available { .. })
    }

    /// Safe to use as a header value: file names come from origins.
    fn subject(&self) -> String {
        let subject = match self {
            Self::Available { file_name, .. } => format!("[golink] {file_name} is available"),
            Self::Failed { file_name, .. } => format!("[golink] {file_name} could not be retrieved"),
        };
        subject.chars().map(|c| if c.is_control() { '_' } else { c }).collect()
    }

    fn body(&self) -> String {
        match self {
            Self::Available { uri, file_name, hash } => {
                format!("The file {file_name} ({uri}) is now available for download.\n\nBLAKE3: {hash}\n")
            },
            Self::Failed { uri, file_name, reason } => {
                format!("The file {file_name} ({uri}) could not be retrieved.\n\nReason: {reason}\n")
            },
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, address: &str, outcome: &Outcome) -> Result<()>;
}

pub type NotifierHandle = Arc<dyn Notifier>;

/// Writes notifications to the log instead of delivering them.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, address: &str, outcome: &Outcome) -> Result<()> {
        tracing::info!(uri = outcome.uri(), address, success = outcome.is_success(), subject = %outcome.subject(), "Notification");
        Ok(())
    }
}

/// Pipes an RFC 5322 message into a sendmail-compatible binary.
#[derive(Clone, Debug)]
pub struct SendmailNotifier {
    binary: PathBuf,
    from: String,
}
impl SendmailNotifier {
    pub fn new(from: impl Into<String>, binary: PathBuf) -> Self {
        Self { binary, from: from.into() }
    }

    /// Locate `sendmail` on `$PATH`.
    pub fn discover(from: impl Into<String>) -> Result<Self> {
        for exe in ["sendmail", "msmtp"] {
            if let Ok(binary) = which::which(exe) {
                tracing::debug!(binary = %binary.display(), "Discovered sendmail-compatible binary");
                return Ok(Self::new(from, binary));
            }
        }
        tracing::warn!("No sendmail-compatible binary found in PATH");
        exn::bail!(ErrorKind::Notify);
    }

    fn message(&self, address: &str, outcome: &Outcome) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}",
            self.from,
            address,
            outcome.subject(),
            outcome.body().replace('\n', "\r\n"),
        )
    }
}

#[async_trait]
impl Notifier for SendmailNotifier {
    async fn notify(&self, address: &str, outcome: &Outcome) -> Result<()> {
        // Addresses are validated upstream, but never let one become a flag.
        if address.starts_with('-') || address.contains(['\r', '\n']) {
            exn::bail!(ErrorKind::InvalidRequest(format!("refusing to mail {address:?}")));
        }
        let mut child = Command::new(&self.binary)
            .args(["-i", "-f", self.from.as_str(), "--", address])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .or_raise(|| ErrorKind::Notify)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(self.message(address, outcome).as_bytes()).await.or_raise(|| ErrorKind::Notify)?;
        }
        let output = child.wait_with_output().await.or_raise(|| ErrorKind::Notify)?;
        if !output.status.success() {
            tracing::warn!(
                binary = %self.binary.display(),
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Sendmail exited unsuccessfully",
            );
            exn::bail!(ErrorKind::Notify);
        }
        tracing::info!(uri = outcome.uri(), address, "Notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn available() -> Outcome {
        Outcome::Available {
            uri: "docs/report.pdf".to_string(),
            file_name: "report.pdf".to_string(),
            hash: "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24".to_string(),
        }
    }

    #[tokio::test]
    async fn test_log_notifier() {
        LogNotifier.notify("someone@example.org", &available()).await.unwrap();
    }

    #[test]
    fn test_message() {
        let notifier = SendmailNotifier::new("golink@example.org", PathBuf::from("/usr/sbin/sendmail"));
        let message = notifier.message("someone@example.org", &available());
        assert!(message.starts_with("From: golink@example.org\r\nTo: someone@example.org\r\n"));
        assert!(message.contains("Subject: [golink] report.pdf is available\r\n"));
        assert!(message.contains("BLAKE3: d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"));

        let failed = Outcome::Failed {
            uri: "a".to_string(),
            file_name: "a.txt".to_string(),
            reason: "timed out".to_string(),
        };
        assert!(!failed.is_success());
        assert!(notifier.message("someone@example.org", &failed).contains("Reason: timed out"));
    }

    #[test]
    fn test_subject_cannot_inject_headers() {
        let notifier = SendmailNotifier::new("golink@example.org", PathBuf::from("/usr/sbin/sendmail"));
        let outcome = Outcome::Available {
            uri: "a".to_string(),
            file_name: "report.pdf\r\nBcc: everyone@example.org".to_string(),
            hash: "cafe".to_string(),
        };
        let message = notifier.message("someone@example.org", &outcome);
        assert!(message.contains("Subject: [golink] report.pdf__Bcc: everyone@example.org is available\r\n"));
        let (headers, _) = message.split_once("\r\n\r\n").unwrap();
        assert!(!headers.lines().any(|line| line.starts_with("Bcc:")));
    }

    #[tokio::test]
    async fn test_refuses_flag_like_address() {
        let notifier = SendmailNotifier::new("golink@example.org", PathBuf::from("/nonexistent/sendmail"));
        let err = notifier.notify("-oQ/tmp", &available()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidRequest(_)));
    }

    #[cfg(unix)]
    fn fake_sendmail(dir: &tempfile::TempDir, name: &str, exit: u8) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\ncat > /dev/null\nexit {exit}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sendmail_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let ok = SendmailNotifier::new("golink@example.org", fake_sendmail(&dir, "ok", 0));
        ok.notify("someone@example.org", &available()).await.unwrap();
        let failing = SendmailNotifier::new("golink@example.org", fake_sendmail(&dir, "failing", 75));
        let err = failing.notify("someone@example.org", &available()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Notify));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let notifier = SendmailNotifier::new("golink@example.org", PathBuf::from("/nonexistent/sendmail"));
        let err = notifier.notify("someone@example.org", &available()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Notify));
    }
}
