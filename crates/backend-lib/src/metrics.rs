// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_ACTIVE: &str = "ws.active";
pub const EVENTS_ROUTED: &str = "contest.events";
pub const SUBMISSIONS_ACCEPTED: &str = "contest.submissions";
pub const BRACKETS_BUILT: &str = "contest.brackets";
pub const SESSION_RESETS: &str = "contest.resets";
