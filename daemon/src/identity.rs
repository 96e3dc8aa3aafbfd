//! Definition of a process to monitor

use serde::{Deserialize, Serialize};

/// A logical process to monitor, independent of any running instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedIdentity {
    pub display_name: String,
    /// Matched against the first argument of each process's command line.
    pub command_substring: String,
    pub owner_account: String,
}

impl TrackedIdentity {
    pub fn new(
        display_name: impl Into<String>,
        command_substring: impl Into<String>,
        owner_account: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            command_substring: command_substring.into(),
            owner_account: owner_account.into(),
        }
    }

    /// Key of this identity in the `/cpu_usage` response.
    pub fn report_key(&self) -> String {
        format!("{}_cpu_percent", self.display_name)
    }

    pub fn not_found_message(&self) -> String {
        format!("{} process not found", capitalize(&self.display_name))
    }
}

/// Upper-case the first character and lower-case the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
