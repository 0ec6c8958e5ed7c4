//! updraft - keeps a long-running host's add-on artifacts current.
//!
//! updraft periodically polls release-hosting APIs, decides whether a newer
//! build exists for each configured source, downloads it atomically and
//! hands the result to the host.
//!
//! # Architecture Overview
//!
//! ```text
//! config ──► registry ──► scheduler ──► pipeline: Fetch ──► Download ──► Install
//!                │                         │          │            │
//!                ▼                         ▼          ▼            ▼
//!             source (one per provider)  state     download     host (control thread)
//! ```
//!
//! - [`config`] - `~/.updraft/config.toml`, legacy layout migration
//! - [`registry`] - builds named sources through a provider registration table
//! - [`source`] - one [`source::VersionSource`] per hosting provider, plus
//!   ranking and asset disambiguation
//! - [`version`] - version comparators and build-number resolution
//! - [`download`] - atomic downloads with checksum, backup and transforms
//! - [`pipeline`] - Fetch → Download → Install with explicit step outcomes
//! - [`scheduler`] - sequential cycles with per-source error isolation
//! - [`state`] - persisted per-source build markers
//! - [`host`] - host module view, lifecycle and the control thread
//! - [`net`] - HTTP transport seam
//! - [`cli`] - the `updraft` command
//!
//! # Example
//!
//! ```rust,no_run
//! use updraft::cli::common::Runtime;
//! use updraft::scheduler::Scheduler;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let runtime = Runtime::load(None, false).await?;
//! let scheduler = Scheduler::new(runtime.pipeline.clone(), runtime.config.updates.interval());
//! let report = scheduler.run_cycle(None).await;
//! println!("{} updated", report.installed.len());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod download;
pub mod host;
pub mod net;
pub mod pipeline;
pub mod registry;
pub mod scheduler;
pub mod source;
pub mod state;
pub mod utils;
pub mod version;

// test_utils is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
