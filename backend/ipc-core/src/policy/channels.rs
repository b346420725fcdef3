//! The static channel tables: which channels skip retries entirely and which
//! get a tuned policy.

use models::ChannelOverride;

use const_format::concatcp;

pub const DIAGNOSTICS_PREFIX: &str = "diagnostics:";

pub const DIAGNOSTICS_CLEAR_ERRORS: &str = concatcp!(DIAGNOSTICS_PREFIX, "clear-errors");
pub const DIAGNOSTICS_EXPORT_ERRORS: &str = concatcp!(DIAGNOSTICS_PREFIX, "export-errors");
pub const DIAGNOSTICS_TOGGLE_WINDOW: &str = concatcp!(DIAGNOSTICS_PREFIX, "toggle-window");
pub const DIAGNOSTICS_SUBSCRIBE_ERRORS: &str = concatcp!(DIAGNOSTICS_PREFIX, "subscribe-errors");
pub const DIAGNOSTICS_UNSUBSCRIBE_ERRORS: &str =
    concatcp!(DIAGNOSTICS_PREFIX, "unsubscribe-errors");
pub const DIAGNOSTICS_DISMISS_NOTIFICATION: &str =
    concatcp!(DIAGNOSTICS_PREFIX, "dismiss-notification");
pub const CREATE_NEW_PAGE: &str = "create-new-page";
pub const START_WEBSITE_DEV_SERVER: &str = "start-website-dev-server";

/// Channels whose handlers have side effects that must not be repeated.
pub const RETRY_BLACKLIST: [&str; 8] = [
    DIAGNOSTICS_CLEAR_ERRORS,
    DIAGNOSTICS_EXPORT_ERRORS,
    DIAGNOSTICS_TOGGLE_WINDOW,
    DIAGNOSTICS_SUBSCRIBE_ERRORS,
    DIAGNOSTICS_UNSUBSCRIBE_ERRORS,
    DIAGNOSTICS_DISMISS_NOTIFICATION,
    CREATE_NEW_PAGE,
    START_WEBSITE_DEV_SERVER,
];

pub const READ_OVERRIDE: ChannelOverride = ChannelOverride::timing(3, 1000, 3000);
pub const WRITE_OVERRIDE: ChannelOverride = ChannelOverride::timing(2, 2000, 5000);
pub const DIAGNOSTICS_READ_OVERRIDE: ChannelOverride = ChannelOverride::timing(2, 1000, 3000);

/// Idempotent lookups: cheap to repeat, fast feedback matters.
pub const READ_CHANNELS: [&str; 8] = [
    "get-website-schema",
    "get-websites",
    "get-website-content",
    "get-website-settings",
    "get-git-history",
    "get-certificates",
    "get-dns-records",
    "get-monitors",
];

/// Mutations: fewer attempts, longer spacing.
pub const WRITE_CHANNELS: [&str; 7] = [
    "save-website",
    "update-website-settings",
    "delete-website",
    "commit-website-changes",
    "request-certificate",
    "update-dns-records",
    "set-window-placement",
];

pub const DIAGNOSTICS_READ_CHANNELS: [&str; 3] = [
    concatcp!(DIAGNOSTICS_PREFIX, "get-errors"),
    concatcp!(DIAGNOSTICS_PREFIX, "get-error-stats"),
    concatcp!(DIAGNOSTICS_PREFIX, "get-system-info"),
];

/// Every override entry, flattened to `(channel, override)`.
pub fn standard_overrides() -> impl Iterator<Item = (&'static str, ChannelOverride)> {
    READ_CHANNELS
        .into_iter()
        .map(|channel| (channel, READ_OVERRIDE))
        .chain(WRITE_CHANNELS.into_iter().map(|channel| (channel, WRITE_OVERRIDE)))
        .chain(
            DIAGNOSTICS_READ_CHANNELS
                .into_iter()
                .map(|channel| (channel, DIAGNOSTICS_READ_OVERRIDE)),
        )
}
