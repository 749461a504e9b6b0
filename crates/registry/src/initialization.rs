use std::collections::HashMap;

use parking_lot::Mutex;

#[derive(Debug)]
enum State {
    /// No peer answered yet, so any team may still arrive.
    Uninitialized,

    /// Lowercase name to original name of every team still to be received.
    Pending(HashMap<String, String>),

    Complete,
}

/// Tracks which teams the node still has to receive from its peers.
#[derive(Debug)]
pub struct InitializationList {
    state: Mutex<State>,
}

impl InitializationList {
    /// Creates an uninitialized list: every team counts as pending.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Uninitialized),
        }
    }

    /// Whether the team is pending, or the list was not set up yet.
    #[must_use]
    pub fn contains_or_not_init(&self, team_name: &str) -> bool {
        match &*self.state.lock() {
            State::Uninitialized => true,
            State::Pending(names) => names.contains_key(&poker_domain::name_key(team_name)),
            State::Complete => false,
        }
    }

    /// Whether the team is known to be pending.
    #[must_use]
    pub fn is_pending(&self, team_name: &str) -> bool {
        match &*self.state.lock() {
            State::Pending(names) => names.contains_key(&poker_domain::name_key(team_name)),
            State::Uninitialized | State::Complete => false,
        }
    }

    /// Whether every team was received.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(*self.state.lock(), State::Complete)
    }

    /// Sets the teams to receive. An empty list completes initialization.
    ///
    /// Returns `false` without changing anything if the list was set up
    /// before.
    pub fn setup<I, N>(&self, team_names: I) -> bool
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let mut state = self.state.lock();
        if !matches!(*state, State::Uninitialized) {
            return false;
        }

        let names: HashMap<String, String> = team_names
            .into_iter()
            .map(Into::into)
            .map(|name| (poker_domain::name_key(&name), name))
            .collect();
        *state = if names.is_empty() {
            State::Complete
        } else {
            State::Pending(names)
        };
        drop(state);

        true
    }

    /// Marks a team as received. Removing the last team completes
    /// initialization.
    ///
    /// Returns whether the team was pending.
    pub fn remove(&self, team_name: &str) -> bool {
        let mut state = self.state.lock();
        let State::Pending(names) = &mut *state else {
            return false;
        };

        let removed = names.remove(&poker_domain::name_key(team_name)).is_some();
        if names.is_empty() {
            *state = State::Complete;
        }
        drop(state);

        removed
    }

    /// Completes initialization, giving up on every pending team.
    pub fn clear(&self) {
        *self.state.lock() = State::Complete;
    }

    /// The pending team names, sorted.
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        match &*self.state.lock() {
            State::Pending(names) => {
                let mut values: Vec<String> = names.values().cloned().collect();
                values.sort_unstable();
                values
            }
            State::Uninitialized | State::Complete => Vec::new(),
        }
    }
}

impl Default for InitializationList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_everything_is_pending_before_setup() {
        let list = InitializationList::new();

        assert!(list.contains_or_not_init("team"));
        assert!(list.contains_or_not_init("anything"));
        assert!(!list.is_pending("team"));
        assert!(!list.is_complete());
        assert!(list.values().is_empty());
    }

    #[test]
    fn test_nothing_is_pending_after_clear() {
        let list = InitializationList::new();
        list.setup(["team"]);

        list.clear();

        assert!(!list.contains_or_not_init("team"));
        assert!(!list.contains_or_not_init("other"));
        assert!(list.is_complete());
    }

    #[test]
    fn test_setup_applies_once() {
        let list = InitializationList::new();

        assert!(list.setup(["Team A", "team b"]));
        assert!(!list.setup(["team c"]));

        assert!(list.contains_or_not_init("TEAM A"));
        assert!(list.is_pending("Team B"));
        assert!(!list.contains_or_not_init("team c"));
        assert_eq!(list.values(), vec!["Team A".to_string(), "team b".to_string()]);
    }

    #[test]
    fn test_empty_setup_completes() {
        let list = InitializationList::new();

        assert!(list.setup(Vec::<String>::new()));

        assert!(list.is_complete());
        assert!(!list.contains_or_not_init("team"));
    }

    #[test]
    fn test_removing_last_team_completes() {
        let list = InitializationList::new();
        list.setup(["a", "b"]);

        assert!(list.remove("A"));
        assert!(!list.remove("a"));
        assert!(!list.is_complete());

        assert!(list.remove("b"));
        assert!(list.is_complete());
        assert!(!list.remove("b"));
    }

    #[test]
    fn test_remove_before_setup_is_ignored() {
        let list = InitializationList::new();

        assert!(!list.remove("team"));
        assert!(list.contains_or_not_init("team"));
    }
}
