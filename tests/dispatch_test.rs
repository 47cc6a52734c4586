//! Integration tests for the dispatcher stage: idempotent resumption over
//! the sent ledger, per-row failure isolation, and the artifact/schema
//! gates.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

use certmill::config::{
    CertificateConfig, Config, DeliveryConfig, NameBox, OutputConfig, RosterConfig,
};
use certmill::dispatch::dispatch_with;
use certmill::error::MailError;
use certmill::mail::{Email, Mailer};
use certmill::render::artifact_paths;

/// Mailer double: records every delivered email, optionally failing one
/// recipient address.
struct MockMailer {
    sent: Mutex<Vec<Email>>,
    fail_for: Option<String>,
}

impl MockMailer {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: None,
        }
    }

    fn failing_for(email: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: Some(email.to_string()),
        }
    }

    fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        if self.fail_for.as_deref() == Some(email.to_email.as_str()) {
            return Err(MailError::SmtpAuth {
                host: "smtp.mock".to_string(),
            });
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

fn test_config(dir: &Path) -> Config {
    let p = |name: &str| dir.join(name).display().to_string();
    Config {
        roster: RosterConfig {
            path: p("roster.csv"),
        },
        certificate: CertificateConfig {
            template: p("certificate.jpg"),
            font: p("font.ttf"),
            font_size: 70.0,
            name_box: NameBox {
                x1: 580,
                y1: 645,
                x2: 1420,
                y2: 810,
            },
            text_color: [0, 0, 0],
        },
        output: OutputConfig {
            pdf_dir: p("certificates_pdf"),
            jpg_dir: p("certificates_jpg"),
            success_log: p("output_success.csv"),
            failure_log: p("output_failure.csv"),
            sent_ledger: p("sent_log.csv"),
        },
        delivery: DeliveryConfig {
            min_delay_secs: 0,
            max_delay_secs: 0,
            ..DeliveryConfig::default()
        },
    }
}

fn write_success_log(config: &Config, content: &str) {
    std::fs::write(&config.output.success_log, content).unwrap();
}

/// Create both artifact files the way the generator would have.
fn create_artifacts(config: &Config, name: &str) {
    let pair = artifact_paths(&config.output, name);
    std::fs::create_dir_all(&config.output.pdf_dir).unwrap();
    std::fs::create_dir_all(&config.output.jpg_dir).unwrap();
    std::fs::write(&pair.pdf, b"%PDF-").unwrap();
    std::fs::write(&pair.jpg, b"\xff\xd8\xff").unwrap();
}

fn ledger_lines(config: &Config) -> Vec<String> {
    std::fs::read_to_string(&config.output.sent_ledger)
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

#[tokio::test]
async fn test_end_to_end_send_and_idempotent_rerun() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_success_log(&config, "name,email\nAlice,a@x.com\n");
    create_artifacts(&config, "Alice");

    // First run delivers and records the one recipient.
    let mailer = MockMailer::new();
    let stats = dispatch_with(&config, &mailer).await.unwrap();
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.already_sent, 0);
    assert_eq!(mailer.sent().len(), 1);
    assert_eq!(mailer.sent()[0].to_email, "a@x.com");
    assert_eq!(mailer.sent()[0].attachments.len(), 2);
    assert_eq!(ledger_lines(&config), vec!["name,email", "Alice,a@x.com"]);

    // Second run over the same success log sends nothing.
    let mailer = MockMailer::new();
    let stats = dispatch_with(&config, &mailer).await.unwrap();
    assert_eq!(stats.sent, 0);
    assert_eq!(stats.already_sent, 1);
    assert!(mailer.sent().is_empty());
    assert_eq!(ledger_lines(&config), vec!["name,email", "Alice,a@x.com"]);
}

#[tokio::test]
async fn test_missing_artifacts_skip_without_ledger_entry() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_success_log(&config, "name,email\nAlice,a@x.com\n");
    // No artifacts on disk.

    let mailer = MockMailer::new();
    let stats = dispatch_with(&config, &mailer).await.unwrap();

    assert_eq!(stats.sent, 0);
    assert_eq!(stats.missing_artifacts, 1);
    assert!(mailer.sent().is_empty());
    // Not marked as sent: the row is retried once artifacts appear.
    assert_eq!(ledger_lines(&config), vec!["name,email"]);
}

#[tokio::test]
async fn test_send_failure_is_isolated_and_retried_next_run() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_success_log(&config, "name,email\nAlice,a@x.com\nBob,b@x.com\n");
    create_artifacts(&config, "Alice");
    create_artifacts(&config, "Bob");

    // Alice's send fails; Bob's still goes out.
    let mailer = MockMailer::failing_for("a@x.com");
    let stats = dispatch_with(&config, &mailer).await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.sent, 1);
    assert_eq!(ledger_lines(&config), vec!["name,email", "Bob,b@x.com"]);

    // Next run retries only Alice.
    let mailer = MockMailer::new();
    let stats = dispatch_with(&config, &mailer).await.unwrap();
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.already_sent, 1);
    assert_eq!(mailer.sent()[0].to_email, "a@x.com");
    assert_eq!(
        ledger_lines(&config),
        vec!["name,email", "Bob,b@x.com", "Alice,a@x.com"]
    );
}

#[tokio::test]
async fn test_ledger_is_superset_across_runs() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_success_log(&config, "name,email\nAlice,a@x.com\n");
    create_artifacts(&config, "Alice");

    dispatch_with(&config, &MockMailer::new()).await.unwrap();
    let after_first = ledger_lines(&config);

    // The success log grows; the ledger only ever gains entries.
    write_success_log(&config, "name,email\nAlice,a@x.com\nBob,b@x.com\n");
    create_artifacts(&config, "Bob");
    dispatch_with(&config, &MockMailer::new()).await.unwrap();
    let after_second = ledger_lines(&config);

    assert_eq!(&after_second[..after_first.len()], &after_first[..]);
    assert_eq!(after_second.len(), after_first.len() + 1);
}

#[tokio::test]
async fn test_invalid_rows_skipped_without_send() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_success_log(&config, "name,email\nAlice,a@x.com\n,b@x.com\nBob,\n");
    create_artifacts(&config, "Alice");

    let mailer = MockMailer::new();
    let stats = dispatch_with(&config, &mailer).await.unwrap();

    assert_eq!(stats.sent, 1);
    assert_eq!(stats.invalid, 2);
    assert_eq!(mailer.sent().len(), 1);
}

#[tokio::test]
async fn test_schema_gate_on_success_log() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_success_log(&config, "name,address\nAlice,a@x.com\n");

    let mailer = MockMailer::new();
    let result = dispatch_with(&config, &mailer).await;

    assert!(result.is_err());
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_personalized_message_content() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_success_log(&config, "name,email\nJane Doe,jane@x.com\n");
    create_artifacts(&config, "Jane Doe");

    let mailer = MockMailer::new();
    dispatch_with(&config, &mailer).await.unwrap();

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("Hi Jane Doe,"));
    assert!(sent[0].html.contains("Jane Doe"));
    assert_eq!(sent[0].attachments[0].filename, "Jane_Doe.pdf");
    assert_eq!(sent[0].attachments[1].filename, "Jane_Doe.jpg");
}
