use std::collections::VecDeque;

use tracing::debug;

use crate::automaton::Automaton;
use crate::math::{Map, OrderedSet, Set};
use crate::state::StateId;

impl Automaton {
    /// Builds the accessible part: a fresh automaton containing exactly the states
    /// reachable from the initial states, found by a breadth-first traversal.
    /// Unreached states are silently dropped.
    pub fn accessible(&self) -> Automaton {
        let mut result = self.empty_like(format!("ac({})", self.name));
        for (_, event) in self.events.iter() {
            result.events.add(event.clone());
        }

        let mut seen: OrderedSet<StateId> = self.initial.clone();
        let mut queue: VecDeque<StateId> = self.initial.iter().copied().collect();
        for &q in &self.initial {
            let id = result.adopt_state(self, q);
            result.initial.insert(id);
        }
        while let Some(q) = queue.pop_front() {
            let new_q = result
                .states
                .id(self.state_name(q))
                .expect("reached states are copied before expansion");
            for t in self.transitions.transitions_from(q) {
                let new_e = result
                    .events
                    .id(self.event_name(t.event()))
                    .expect("all events copied");
                for &p in t.targets() {
                    if seen.insert(p) {
                        result.adopt_state(self, p);
                        queue.push_back(p);
                    }
                    let new_p = result
                        .states
                        .id(self.state_name(p))
                        .expect("target was just copied");
                    result.transitions.add(new_q, new_e, new_p);
                }
            }
        }
        debug!(
            "accessible part of {} keeps {} of {} states",
            self.name,
            result.states.len(),
            self.states.len()
        );
        result
    }

    /// The set of states from which a marked state is reachable, computed as a
    /// backward fixed point over a predecessor map. This replaces the memoized
    /// recursive traversal of the original formulation with an explicit worklist;
    /// the resulting set is identical.
    pub(crate) fn coreachable_set(&self) -> Set<StateId> {
        let mut predecessors: Map<StateId, Vec<StateId>> = Map::default();
        for (q, t) in self.transitions.iter() {
            for &p in t.targets() {
                predecessors.entry(p).or_default().push(q);
            }
        }
        let mut coreachable: Set<StateId> = self
            .states
            .iter()
            .filter(|(_, s)| s.is_marked())
            .map(|(id, _)| id)
            .collect();
        let mut queue: VecDeque<StateId> = coreachable.iter().copied().collect();
        while let Some(p) = queue.pop_front() {
            for &q in predecessors.get(&p).map(Vec::as_slice).unwrap_or(&[]) {
                if coreachable.insert(q) {
                    queue.push_back(q);
                }
            }
        }
        coreachable
    }

    /// Builds the co-accessible part: only states from which a marked state is
    /// reachable survive, each kept transition's target set is truncated to the
    /// surviving targets, and transitions whose target set empties are dropped.
    pub fn coaccessible(&self) -> Automaton {
        let coreachable = self.coreachable_set();
        let excluded: Set<String> = self
            .states
            .iter()
            .filter(|(id, _)| !coreachable.contains(id))
            .map(|(_, s)| s.name().to_string())
            .collect();
        self.restrict(format!("coac({})", self.name), &excluded)
    }

    /// Trims the automaton: the co-accessible part of the accessible part. Every
    /// surviving state is reachable from an initial state and can reach a marked
    /// state.
    pub fn trim(&self) -> Automaton {
        let mut trimmed = self.accessible().coaccessible();
        trimmed.name = format!("trim({})", self.name);
        trimmed
    }

    /// Checks whether the automaton is blocking, i.e. whether some state cannot
    /// reach a marked state. Every non-coaccessible state is flagged `bad` as a
    /// side effect; this is intentional and used interactively to highlight
    /// problem states.
    pub fn is_blocking(&mut self) -> bool {
        let coreachable = self.coreachable_set();
        let flagged: Vec<StateId> = self
            .states
            .iter()
            .filter(|(id, _)| !coreachable.contains(id))
            .map(|(id, _)| id)
            .collect();
        for &id in &flagged {
            if let Some(state) = self.states.get_mut(id) {
                state.set_bad(true);
            }
        }
        !flagged.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_chain() -> Automaton {
        Automaton::builder("G")
            .with_transitions([("1", "a", "2"), ("2", "a", "3")])
            .with_initial("1")
            .with_marked(["3"])
            .into_deterministic()
    }

    #[test]
    fn trim_keeps_a_live_chain_unchanged() {
        let g = three_chain();
        let t = g.trim();
        assert_eq!(t.states().len(), 3);
        assert_eq!(t.transitions().triple_count(), 2);
        for name in ["1", "2", "3"] {
            assert!(t.contains_state(name));
        }
    }

    #[test]
    fn accessible_drops_unreachable_states() {
        // state 4 has no incoming edges
        let g = Automaton::builder("G")
            .with_transitions([("1", "a", "2"), ("2", "a", "3")])
            .with_states(["4"])
            .with_initial("1")
            .with_marked(["3"])
            .into_deterministic();
        let a = g.accessible();
        assert_eq!(a.states().len(), 3);
        assert!(!a.contains_state("4"));
    }

    #[test]
    fn trim_removes_unmarked_dead_ends() {
        // a nondeterministic branch into a dead end
        let g = Automaton::builder("G")
            .with_transitions([("1", "a", "2"), ("1", "a", "3"), ("2", "b", "4")])
            .with_initial("1")
            .with_marked(["4"])
            .into_nondeterministic();
        let t = g.trim();
        assert!(!t.contains_state("3"));
        assert_eq!(t.states().len(), 3);
        let q1 = t.states().id("1").unwrap();
        let a = t.events().id("a").unwrap();
        // the target set of 1 -a-> {2,3} is truncated to {2}
        assert_eq!(t.transitions().successors(q1, a).unwrap().len(), 1);
    }

    #[test]
    fn accessible_is_idempotent() {
        let g = Automaton::builder("G")
            .with_transitions([("1", "a", "2"), ("3", "a", "2")])
            .with_initial("1")
            .with_marked(["2"])
            .into_deterministic();
        let once = g.accessible();
        let twice = once.accessible();
        assert_eq!(once.states().len(), twice.states().len());
        assert_eq!(
            once.transitions().triple_count(),
            twice.transitions().triple_count()
        );
    }

    #[test]
    fn trim_is_idempotent() {
        let g = Automaton::builder("G")
            .with_transitions([("1", "a", "2"), ("2", "b", "3"), ("2", "c", "5")])
            .with_initial("1")
            .with_marked(["3"])
            .into_deterministic();
        let once = g.trim();
        let twice = once.trim();
        assert_eq!(once.states().len(), twice.states().len());
        assert_eq!(
            once.transitions().triple_count(),
            twice.transitions().triple_count()
        );
    }

    #[test]
    fn blocking_flags_bad_states() {
        let mut g = Automaton::builder("G")
            .with_transitions([("1", "a", "2"), ("2", "b", "3"), ("2", "c", "5")])
            .with_initial("1")
            .with_marked(["3"])
            .into_deterministic();
        assert!(g.is_blocking());
        let q5 = g.states().id("5").unwrap();
        assert!(g.states().get(q5).unwrap().is_bad());
        let q2 = g.states().id("2").unwrap();
        assert!(!g.states().get(q2).unwrap().is_bad());
    }

    #[test]
    fn nonblocking_automaton_stays_clean() {
        let mut g = three_chain();
        assert!(!g.is_blocking());
        assert!(g.states().iter().all(|(_, s)| !s.is_bad()));
    }
}
