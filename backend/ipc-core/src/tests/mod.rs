mod classify;
mod guard;
mod policy_registry;
mod sanitize;
mod support;
