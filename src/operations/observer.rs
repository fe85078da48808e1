use std::collections::VecDeque;

use itertools::Itertools;
use tracing::trace;

use crate::automaton::Automaton;
use crate::math::{Map, OrderedSet};
use crate::state::{State, StateId};
use crate::transition::Shape;

/// How the observer construction decides whether an aggregate state is marked.
///
/// The two rules encode different properties. `Any` preserves "some accepted
/// continuation exists", which is what opacity and supervisor views need and is the
/// default. `All` is the classical determinization rule where an aggregate accepts
/// only when every member does; it is kept selectable until a caller needs it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MarkingRule {
    /// The aggregate is marked when at least one member state is marked.
    #[default]
    Any,
    /// The aggregate is marked only when every member state is marked.
    All,
}

impl MarkingRule {
    fn marks<'a, I: IntoIterator<Item = &'a State>>(self, members: I) -> bool {
        match self {
            MarkingRule::Any => members.into_iter().any(State::is_marked),
            MarkingRule::All => members.into_iter().all(State::is_marked),
        }
    }
}

impl Automaton {
    /// Builds the observer view: a deterministic automaton over the observable
    /// events whose states are epsilon-closure aggregates of this automaton's
    /// states, with unobservable events treated as epsilon moves. The construction
    /// starts from the closure of the initial state(s) and uses the default
    /// [`MarkingRule::Any`].
    pub fn observer(&self) -> Automaton {
        self.observer_with(MarkingRule::default())
    }

    /// Like [`Automaton::observer`], with an explicit marking rule.
    pub fn observer_with(&self, marking: MarkingRule) -> Automaton {
        self.observer_core(format!("obs({})", self.name), marking, false)
            .0
    }

    /// Determinizes a nondeterministic automaton. This is the observer construction
    /// seeded with the union of all initial states' closures; on an automaton whose
    /// events are all observable it degenerates to the plain subset construction.
    pub fn determinize(&self) -> Automaton {
        self.observer_core(format!("det({})", self.name), MarkingRule::default(), false)
            .0
    }

    /// Builds the universal observer view: the same aggregate structure, but with
    /// every state of this automaton seeded as a possible starting point
    /// simultaneously. Returns the observer together with a map from each original
    /// state name to the name of its own epsilon-closure aggregate. The result's
    /// initial state is still the aggregate of the ordinary initial state(s).
    pub fn universal_observer(&self) -> (Automaton, Map<String, String>) {
        self.observer_core(format!("uobs({})", self.name), MarkingRule::default(), true)
    }

    fn observer_core(
        &self,
        name: String,
        marking: MarkingRule,
        universal: bool,
    ) -> (Automaton, Map<String, String>) {
        let mut result = Automaton::new(name, Shape::Deterministic);
        for (_, event) in self.events.iter().filter(|(_, e)| e.is_observable()) {
            result.events.add(event.clone());
        }

        let closures = self
            .transitions
            .epsilon_reach(self.states.iter().map(|(id, _)| id), &self.events);

        let mut visited: Map<OrderedSet<StateId>, StateId> = Map::default();
        let mut queue: VecDeque<OrderedSet<StateId>> = VecDeque::new();

        let mut ensure_aggregate = |members: OrderedSet<StateId>,
                                    result: &mut Automaton,
                                    queue: &mut VecDeque<OrderedSet<StateId>>,
                                    visited: &mut Map<OrderedSet<StateId>, StateId>|
         -> StateId {
            if let Some(&id) = visited.get(&members) {
                return id;
            }
            let names: OrderedSet<String> = members
                .iter()
                .map(|&q| self.state_name(q).to_string())
                .collect();
            let states = members
                .iter()
                .map(|&q| self.states.get(q).expect("live id"))
                .collect_vec();
            let id = result.add_state(
                State::new(format!("{{{}}}", names.iter().join(",")))
                    .with_marked(marking.marks(states.iter().copied()))
                    .with_private(states.iter().all(|s| s.is_private())),
            );
            result.record_composition(id, names);
            queue.push_back(members.clone());
            visited.insert(members, id);
            id
        };

        // the aggregate holding the original initial state(s)
        let initial_members: OrderedSet<StateId> = self
            .initial
            .iter()
            .flat_map(|q| closures[q].iter().copied())
            .collect();
        if !initial_members.is_empty() {
            let id = ensure_aggregate(initial_members, &mut result, &mut queue, &mut visited);
            result.initial.insert(id);
        }

        let mut closure_aggregate: Map<String, String> = Map::default();
        if universal {
            for (q, state) in self.states.iter() {
                let id = ensure_aggregate(closures[&q].clone(), &mut result, &mut queue, &mut visited);
                closure_aggregate.insert(
                    state.name().to_string(),
                    result.state_name(id).to_string(),
                );
            }
        }

        while let Some(members) = queue.pop_front() {
            let source = visited[&members];
            // union the observable transitions over the closure set, grouped by event
            let mut by_event: Map<crate::event::EventId, OrderedSet<StateId>> = Map::default();
            for &q in &members {
                for t in self.transitions.transitions_from(q) {
                    let observable = self
                        .events
                        .get(t.event())
                        .is_some_and(|e| e.is_observable());
                    if !observable {
                        continue;
                    }
                    by_event
                        .entry(t.event())
                        .or_default()
                        .extend(t.targets().iter().copied());
                }
            }
            for (event, targets) in by_event
                .into_iter()
                .sorted_by_key(|&(e, _)| e)
            {
                let aggregate: OrderedSet<StateId> = targets
                    .iter()
                    .flat_map(|q| closures[q].iter().copied())
                    .collect();
                let target =
                    ensure_aggregate(aggregate, &mut result, &mut queue, &mut visited);
                let e = result
                    .events
                    .id(self.event_name(event))
                    .expect("observable events copied");
                result.transitions.add(source, e, target);
            }
        }
        trace!(
            "observer of {} has {} aggregate states",
            self.name,
            result.states.len()
        );
        (result, closure_aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1 -a-> {2,3}, 2 -b-> 4, 3 -tau-> 5 with tau unobservable, 4 and 5 marked.
    fn plant() -> Automaton {
        Automaton::builder("G")
            .with_transitions([
                ("1", "a", "2"),
                ("1", "a", "3"),
                ("2", "b", "4"),
                ("3", "tau", "5"),
            ])
            .unobservable(["tau"])
            .with_initial("1")
            .with_marked(["4", "5"])
            .into_nondeterministic()
    }

    #[test_log::test]
    fn observer_aggregates_through_epsilon_closures() {
        let obs = plant().observer();
        assert!(obs.is_deterministic());
        assert!(obs.contains_state("{1}"));
        // after a, the closure pulls in 5 through the unobservable tau at 3
        assert!(obs.contains_state("{2,3,5}"));
        assert!(obs.contains_state("{4}"));
        assert!(!obs.events().contains("tau"));
    }

    #[test]
    fn aggregate_marked_when_any_member_is() {
        let obs = plant().observer();
        let agg = obs.states().id("{2,3,5}").unwrap();
        assert!(obs.states().get(agg).unwrap().is_marked());
    }

    #[test]
    fn all_rule_marks_only_uniformly_marked_aggregates() {
        let obs = plant().observer_with(MarkingRule::All);
        let agg = obs.states().id("{2,3,5}").unwrap();
        assert!(!obs.states().get(agg).unwrap().is_marked());
        let four = obs.states().id("{4}").unwrap();
        assert!(obs.states().get(four).unwrap().is_marked());
    }

    #[test]
    fn determinization_preserves_marked_reachability() {
        let g = plant();
        let det = g.determinize();
        // the word "ab" reaches marked state 4 in the source, so it must reach a
        // marked aggregate; the word "a" reaches 5 through tau, likewise marked
        let init = det.initial_state().unwrap();
        let a = det.events().id("a").unwrap();
        let b = det.events().id("b").unwrap();
        let after_a = det.transitions().successors(init, a).unwrap().iter().next().copied().unwrap();
        assert!(det.states().get(after_a).unwrap().is_marked());
        let after_ab = det
            .transitions()
            .successors(after_a, b)
            .unwrap()
            .iter()
            .next()
            .copied()
            .unwrap();
        assert!(det.states().get(after_ab).unwrap().is_marked());
    }

    #[test]
    fn observer_records_compositions() {
        let obs = plant().observer();
        let agg = obs.states().id("{2,3,5}").unwrap();
        assert_eq!(
            obs.composition_of(agg),
            OrderedSet::from(["2".to_string(), "3".to_string(), "5".to_string()])
        );
    }

    #[test]
    fn universal_observer_seeds_every_state() {
        let (uobs, closure_of) = plant().universal_observer();
        // every original state maps to its own closure aggregate
        assert_eq!(closure_of["1"], "{1}");
        assert_eq!(closure_of["3"], "{3,5}");
        assert_eq!(closure_of["4"], "{4}");
        assert!(uobs.contains_state("{3,5}"));
        // the ordinary initial aggregate is still the initial state
        let init = uobs.initial_state().unwrap();
        assert_eq!(uobs.states().get(init).unwrap().name(), "{1}");
    }

    #[test]
    fn observer_private_only_when_all_members_private() {
        let mut g = plant();
        g.set_private("2", true);
        let obs = g.observer();
        let agg = obs.states().id("{2,3,5}").unwrap();
        assert!(!obs.states().get(agg).unwrap().is_private());
        let mut h = plant();
        h.set_private("4", true);
        let obs = h.observer();
        let four = obs.states().id("{4}").unwrap();
        assert!(obs.states().get(four).unwrap().is_private());
    }
}
