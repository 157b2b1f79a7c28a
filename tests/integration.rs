//! Integration test suite (requires a real CRM deployment).
//!
//! Run all integration tests with:
//!   CRM_URL=... CRM_USERNAME=... CRM_PASSWORD=... \
//!     cargo test --test integration -- --ignored --nocapture

#[path = "integration/common.rs"]
mod common;
#[path = "integration/org.rs"]
mod org;
#[path = "integration/metadata.rs"]
mod metadata;
#[path = "integration/discovery.rs"]
mod discovery;
