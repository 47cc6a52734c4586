//! certmill: batch certificate generation and idempotent email dispatch.
//!
//! Two sequential stages over a name/email roster, connected by CSV logs:
//! the generator renders a PDF + JPEG certificate pair per valid row and
//! classifies every row as success or failure; the dispatcher emails each
//! successfully generated certificate exactly once across runs, using an
//! append-only sent ledger for durable resumption.
//!
//! # Example
//!
//! ```ignore
//! use certmill::{Config, run_generate, run_dispatch, error::PipelineError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PipelineError> {
//!     let config = Config::from_file("config.yaml")?;
//!     let generated = run_generate(&config)?;
//!     println!("Generated {} certificates", generated.generated);
//!     let dispatched = run_dispatch(&config).await?;
//!     println!("Sent {} emails", dispatched.sent);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod generate;
pub mod ledger;
pub mod mail;
pub mod render;
pub mod roster;

// Re-export main types
pub use config::Config;
pub use dispatch::{dispatch_with, run_dispatch, DispatchStats};
pub use generate::{generate_with, run_generate, GenerateStats};
pub use ledger::SentLedger;
