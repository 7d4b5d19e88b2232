//! Session identifiers

use chrono::{Local, NaiveTime, Timelike};
use uuid::Uuid;

/// Longest prompt prefix kept in a session id
pub const SESSION_PREFIX_LEN: usize = 30;

/// Derive a directory-safe session id from a prompt and the local time
///
/// `"get jobs with 'Completed' or 'Started' status"` at 12:22:22 becomes
/// `"get_jobs_with_completed_or_sta__12_22_22"`.
pub fn generate_session_id(raw_prompt: &str) -> String {
    session_id_at(raw_prompt, Local::now().time())
}

/// Session id that no other request gets, for conversations served concurrently
///
/// Adds a short random suffix to [`generate_session_id`], so two requests with
/// the same prompt in the same second still get separate workspaces.
pub fn unique_session_id(raw_prompt: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", generate_session_id(raw_prompt), &suffix[..8])
}

pub fn session_id_at(raw_prompt: &str, time: NaiveTime) -> String {
    let prefix: String = raw_prompt
        .to_lowercase()
        .replace(' ', "_")
        .replace('\'', "")
        .chars()
        .take(SESSION_PREFIX_LEN)
        .collect();

    format!(
        "{}__{:02}_{:02}_{:02}",
        prefix,
        time.hour(),
        time.minute(),
        time.second()
    )
}
