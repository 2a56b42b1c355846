//! Channel invite roster.

use std::collections::{HashMap, HashSet};

/// Ordered, de-duplicated set of Slack users to invite into a job channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InviteRoster {
    users: Vec<String>,
}

impl InviteRoster {
    /// Union the fixed invite list with the estimator's mapped user.
    ///
    /// Blank IDs and the bot's own ID are dropped; first occurrence wins.
    #[must_use]
    pub fn resolve(
        always_invite: &[String],
        estimators: &HashMap<String, String>,
        estimator_name: Option<&str>,
        bot_user_id: Option<&str>,
    ) -> Self {
        let estimator_user = estimator_name.and_then(|name| lookup_estimator(estimators, name));

        let mut seen = HashSet::new();
        let users = always_invite
            .iter()
            .map(String::as_str)
            .chain(estimator_user)
            .map(str::trim)
            .filter(|id| !id.is_empty() && Some(*id) != bot_user_id)
            .filter(|id| seen.insert(*id))
            .map(str::to_owned)
            .collect();

        Self { users }
    }

    /// Users to invite, in order.
    #[must_use]
    pub fn users(&self) -> &[String] {
        &self.users
    }

    /// `true` when there is nobody to invite.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Case-insensitive estimator name lookup.
fn lookup_estimator<'a>(estimators: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    let name = name.trim();
    estimators
        .get(name)
        .or_else(|| {
            estimators
                .iter()
                .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
                .map(|(_, user)| user)
        })
        .map(String::as_str)
}
