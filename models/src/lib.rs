//! Data exchanged between the front-end and the privileged backend.
//!
//! These types carry no behavior beyond construction-time validation in the
//! builders. Everything that acts on them (policy resolution, guarding,
//! retrying) lives in `ipc-core`.

pub mod environment;
pub mod error;
pub mod guard;
pub mod policy;
pub mod safe_error;
pub mod telemetry;
pub mod wire;

pub use common::ErrorLocation;
pub use environment::RuntimeEnvironment;
pub use error::model_error::ModelError;
pub use guard::config::{GuardConfig, GuardConfigBuilder};
pub use guard::schema::ValidationSchema;
pub use policy::builder::RetryPolicyBuilder;
pub use policy::retry_policy::{ChannelOverride, RetryPolicy};
pub use safe_error::SafeError;
pub use telemetry::{RetryAttemptEvent, TelemetryConfig};
pub use wire::{IpcClientMessage, IpcOutcome, IpcServerMessage};
