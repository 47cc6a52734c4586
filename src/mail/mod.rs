//! Certificate email construction.
//!
//! A thin layer over [lettre](https://lettre.rs): each recipient gets a
//! multipart message with alternative plain/HTML bodies personalized with
//! their name, plus the two certificate artifacts as binary attachments
//! under their original filenames.

mod mailer;

pub use mailer::{Mailer, SmtpConfig, SmtpMailer};

use snafu::prelude::*;
use std::fs;
use std::path::Path;

use crate::error::{MailError, ReadAttachmentSnafu};
use crate::render::ArtifactPair;

/// A file attached to an outgoing message.
#[derive(Debug, Clone)]
pub struct AttachmentFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A complete certificate email ready to hand to a [`Mailer`].
#[derive(Debug, Clone)]
pub struct Email {
    pub to_name: String,
    pub to_email: String,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub attachments: Vec<AttachmentFile>,
}

/// Build the certificate email for one recipient, reading both artifacts
/// from disk.
pub fn certificate_email(
    name: &str,
    email: &str,
    subject: &str,
    artifacts: &ArtifactPair,
) -> Result<Email, MailError> {
    Ok(Email {
        to_name: name.to_string(),
        to_email: email.to_string(),
        subject: subject.to_string(),
        text: plain_body(name),
        html: html_body(name),
        attachments: vec![
            load_attachment(&artifacts.pdf, "application/pdf")?,
            load_attachment(&artifacts.jpg, "image/jpeg")?,
        ],
    })
}

fn load_attachment(path: &Path, content_type: &str) -> Result<AttachmentFile, MailError> {
    let bytes = fs::read(path).context(ReadAttachmentSnafu {
        path: path.display().to_string(),
    })?;
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(AttachmentFile {
        filename,
        content_type: content_type.to_string(),
        bytes,
    })
}

fn plain_body(name: &str) -> String {
    format!(
        "Hi {name},\n\nCongratulations!\n\nPlease find your certificate of achievement \
         attached.\n\nBest regards,\nThe Team"
    )
}

fn html_body(name: &str) -> String {
    format!(
        "<html><body><p>Hi {name},</p><p><strong>Congratulations!</strong></p>\
         <p>Please find your certificate of achievement attached.</p>\
         <p>Best regards,<br>The Team</p></body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_bodies_are_personalized() {
        assert!(plain_body("Alice").starts_with("Hi Alice,"));
        assert!(html_body("Alice").contains("<p>Hi Alice,</p>"));
    }

    #[test]
    fn test_certificate_email_reads_both_artifacts() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("Jane_Doe.pdf");
        let jpg = dir.path().join("Jane_Doe.jpg");
        std::fs::write(&pdf, b"%PDF-").unwrap();
        std::fs::write(&jpg, b"\xff\xd8\xff").unwrap();

        let email = certificate_email(
            "Jane Doe",
            "jane@x.com",
            "Your certificate",
            &ArtifactPair { pdf, jpg },
        )
        .unwrap();

        assert_eq!(email.to_email, "jane@x.com");
        assert_eq!(email.attachments.len(), 2);
        assert_eq!(email.attachments[0].filename, "Jane_Doe.pdf");
        assert_eq!(email.attachments[0].content_type, "application/pdf");
        assert_eq!(email.attachments[1].filename, "Jane_Doe.jpg");
        assert_eq!(email.attachments[1].content_type, "image/jpeg");
    }

    #[test]
    fn test_missing_artifact_is_an_error() {
        let result = certificate_email(
            "Ghost",
            "ghost@x.com",
            "Subject",
            &ArtifactPair {
                pdf: PathBuf::from("/nonexistent/Ghost.pdf"),
                jpg: PathBuf::from("/nonexistent/Ghost.jpg"),
            },
        );
        assert!(matches!(result, Err(MailError::ReadAttachment { .. })));
    }
}
