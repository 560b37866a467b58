/// The cookie holding the signed admin session token.
pub const ADMIN_SESSION_COOKIE: &str = "admin_session";

/// Lifetime of an admin session, in seconds.
pub const ADMIN_SESSION_MAX_AGE: i64 = 60 * 60 * 24;
