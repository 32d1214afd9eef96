//! Meridian testing infrastructure
//!
//! Shared fixtures for the integration tests of every Meridian crate: well
//! known organizations and identities, resource builders, and a
//! [`Scenario`] that seeds an in-memory store with a small federation.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```rust,no_run
//! use meridian_testkit::*;
//!
//! # async fn demo() {
//! let scenario = Scenario::new();
//! let executor = scenario.executor();
//! let outcome = executor
//!     .execute(&remote_organization_identity(), meridian_authorization::Command::Create(
//!         TaskBuilder::requested().build(),
//!     ))
//!     .await;
//! assert_eq!(outcome.status_code(), 201);
//! # }
//! ```

pub mod builders;
pub mod fixtures;
pub mod logging;
pub mod scenario;

pub use builders::*;
pub use fixtures::*;
pub use logging::init_test_tracing;
pub use scenario::Scenario;
