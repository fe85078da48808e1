//! Opacity: whether an observer can tell the private states apart from the
//! public ones.

use crate::automaton::Automaton;
use crate::math::OrderedSet;

impl Automaton {
    /// The names of all private states, sorted.
    ///
    /// On an observer view this is the opacity test proper: an aggregate state is
    /// private only when every member is, so a non-empty result means some
    /// observation history pins the system to secret states and the secret is
    /// exposed. Run it on [`Automaton::observer`] output (before or after
    /// supervisor synthesis) rather than on the raw plant, where it merely lists
    /// the secrets themselves.
    pub fn exposed_secrets(&self) -> OrderedSet<String> {
        self.states
            .iter()
            .filter(|(_, s)| s.is_private())
            .map(|(_, s)| s.name().to_string())
            .collect()
    }

    /// Whether no private state remains distinguishable, i.e.
    /// [`Automaton::exposed_secrets`] is empty.
    pub fn is_opaque(&self) -> bool {
        self.states.iter().all(|(_, s)| !s.is_private())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposed_secrets_lists_private_states() {
        let mut g = Automaton::builder("G")
            .with_transitions([("1", "a", "2"), ("1", "b", "3")])
            .with_initial("1")
            .with_private(["2"])
            .into_deterministic();
        assert_eq!(g.exposed_secrets(), OrderedSet::from(["2".to_string()]));
        assert!(!g.is_opaque());
        g.set_private("2", false);
        assert!(g.is_opaque());
    }

    #[test]
    fn observer_hides_secrets_shadowed_by_public_states() {
        // 1 -a-> 2 (secret) and 1 -a-> 3 (public): after observing a, the attacker
        // sees the aggregate {2,3} and cannot tell which one holds
        let covered = Automaton::builder("G")
            .with_transitions([("1", "a", "2"), ("1", "a", "3")])
            .with_initial("1")
            .with_private(["2"])
            .into_nondeterministic();
        assert!(covered.observer().is_opaque());

        // with a distinct label on the public branch, observing a pins state 2
        let exposed = Automaton::builder("G")
            .with_transitions([("1", "a", "2"), ("1", "b", "3")])
            .with_initial("1")
            .with_private(["2"])
            .into_nondeterministic();
        assert_eq!(
            exposed.observer().exposed_secrets(),
            OrderedSet::from(["{2}".to_string()])
        );
    }
}
