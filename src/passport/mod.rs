//! Passport service integration subsystem.
//!
//! # Data Flow
//! ```text
//! DI.AppStart request  → DeviceInitInterceptor → read_product_passport (mTLS GET)
//! TO2.Done2 response   → OnboardingInterceptor → create_commissioning_record (HTTP POST)
//! ```
//!
//! # Failure Contract
//! - Every call is best-effort: callers log and drop errors
//! - All calls have a deadline (`passport.request_timeout_secs`)
//! - An unconfigured endpoint is reported as `NotConfigured`, never retried

pub mod client;
pub mod types;

pub use client::{HttpPassportClient, PassportClient};
pub use types::{
    CommissioningCreateRequest, PassportError, PassportResult, ProductItemAgent,
    ProductItemMetadata, ProductItemPassport, ProductItemRecord,
};
