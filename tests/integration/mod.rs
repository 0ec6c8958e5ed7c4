//! Integration test suite for updraft
//!
//! End-to-end runs of the registry, pipeline and scheduler against canned
//! provider responses served by `FakeTransport`. No test touches the network.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **common**: `TestHost`, a temporary host layout wired to a fake transport
//! - **end_to_end**: full cycles across several providers
//! - **migration**: legacy configuration and state files

mod common;
mod end_to_end;
mod migration;
