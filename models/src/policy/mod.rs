pub mod builder;
pub mod retry_policy;
