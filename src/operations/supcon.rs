use tracing::trace;

use crate::automaton::Automaton;
use crate::math::{Map, OrderedSet, Set};
use crate::event::EventId;
use crate::state::StateId;

/// The per-plant-state result of the disabled-event computation: either the state
/// cannot be kept at all, or a specific set of events must be disabled there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disabled {
    /// The state must be removed entirely.
    State,
    /// These events (plant event ids) are disabled at the state; the set may be
    /// empty, meaning the state is fully enabled.
    Events(OrderedSet<EventId>),
}

enum Status {
    InProgress,
    Done(Disabled),
}

impl Automaton {
    /// Computes the supremal controllable sublanguage of this plant with respect to
    /// `spec`, an automaton over (a subset of) the same state names. The result is a
    /// fresh automaton keeping only states that are not fully disabled and only
    /// transitions whose event stays enabled at the source and whose target
    /// survives.
    ///
    /// The rules, per state: a state the spec does not know is disabled outright; an
    /// event the spec does not enable at the corresponding state is disabled, unless
    /// it is uncontrollable, in which case the state itself has to go (uncontrollable
    /// events cannot be vetoed); a transition into a fully disabled target likewise
    /// disables the whole state when its event is uncontrollable and just the event
    /// otherwise;
    /// and disabled events behind an unobservable transition propagate upward,
    /// because the controller cannot distinguish that branch.
    pub fn supremal_controllable(&self, spec: &Automaton) -> Automaton {
        let records = self.disabled_events(spec);
        let excluded: Set<String> = records
            .iter()
            .filter(|(_, d)| matches!(d, Disabled::State))
            .map(|(&q, _)| self.state_name(q).to_string())
            .collect();

        let mut result = self.restrict(format!("supC({})", self.name), &excluded);
        // strip transitions on events disabled at their (surviving) source
        for (&q, record) in records.iter() {
            let Disabled::Events(events) = record else {
                continue;
            };
            if events.is_empty() {
                continue;
            }
            let Some(new_q) = result.states.id(self.state_name(q)) else {
                continue;
            };
            for &event in events {
                let event_name = self.event_name(event);
                let Some(new_e) = result.events.id(event_name) else {
                    continue;
                };
                let targets: Vec<StateId> = result
                    .transitions
                    .successors(new_q, new_e)
                    .map(|t| t.iter().copied().collect())
                    .unwrap_or_default();
                for target in targets {
                    result.transitions.remove(new_q, new_e, target);
                }
            }
        }
        result
    }

    /// Computes, for every plant state, its [`Disabled`] record with respect to
    /// `spec`. States are matched between plant and spec by name. The traversal is
    /// depth-first with a completed-results cache; a state encountered while it is
    /// still being computed yields "no information yet" to its caller rather than
    /// recursing further, and the driver visits every state as an entry point so
    /// that all records eventually finalize even on cyclic graphs.
    pub fn disabled_events(&self, spec: &Automaton) -> Map<StateId, Disabled> {
        let mut status: Map<StateId, Status> = Map::default();
        for (q, _) in self.states.iter() {
            self.disabled_visit(spec, q, &mut status);
        }
        status
            .into_iter()
            .map(|(q, s)| match s {
                Status::Done(d) => (q, d),
                Status::InProgress => unreachable!("driver finalizes every entry point"),
            })
            .collect()
    }

    /// One depth-first visit; returns `None` while `q` is still on the stack.
    fn disabled_visit(
        &self,
        spec: &Automaton,
        q: StateId,
        status: &mut Map<StateId, Status>,
    ) -> Option<Disabled> {
        match status.get(&q) {
            Some(Status::Done(d)) => return Some(d.clone()),
            Some(Status::InProgress) => return None,
            None => {}
        }
        status.insert(q, Status::InProgress);

        let record = self.disabled_record(spec, q, status);
        status.insert(q, Status::Done(record.clone()));
        Some(record)
    }

    fn disabled_record(
        &self,
        spec: &Automaton,
        q: StateId,
        status: &mut Map<StateId, Status>,
    ) -> Disabled {
        let Some(spec_q) = spec.states.id(self.state_name(q)) else {
            trace!("spec has no state {}, disabling it", self.state_name(q));
            return Disabled::State;
        };

        let mut disabled = OrderedSet::new();
        for t in self.transitions.transitions_from(q) {
            let event = self.events.get(t.event()).expect("live id");
            let spec_enables = spec
                .events
                .id(event.name())
                .and_then(|e| spec.transitions.successors(spec_q, e))
                .is_some();
            if !spec_enables {
                if !event.is_controllable() {
                    // the plant can always take it, and the spec never allows it
                    return Disabled::State;
                }
                disabled.insert(t.event());
                continue;
            }
            for &target in t.targets() {
                match self.disabled_visit(spec, target, status) {
                    Some(Disabled::State) => {
                        if !event.is_controllable() {
                            // an uncontrollable event into a removed state cannot be
                            // vetoed, the only fix is to never enter this state
                            return Disabled::State;
                        }
                        disabled.insert(t.event());
                    }
                    Some(Disabled::Events(events)) => {
                        if !event.is_observable() {
                            disabled.extend(events);
                        }
                    }
                    // still mid-traversal: no additional information yet
                    None => {}
                }
            }
        }
        Disabled::Events(disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn uncontrollable_path_to_forbidden_state_removes_the_source() {
        // plant 1 -a-> 2 with a uncontrollable, the specification forbids 2
        let plant = Automaton::builder("G")
            .with_transitions([("1", "a", "2")])
            .with_initial("1")
            .with_marked(["2"])
            .uncontrollable(["a"])
            .into_deterministic();
        let spec = Automaton::builder("E")
            .with_states(["1"])
            .with_initial("1")
            .into_deterministic();
        let sup = plant.supremal_controllable(&spec);
        assert!(!sup.contains_state("1"));
        assert!(sup.states().is_empty());
    }

    #[test]
    fn controllable_path_to_forbidden_state_only_disables_the_event() {
        let plant = Automaton::builder("G")
            .with_transitions([("1", "a", "2"), ("1", "b", "3")])
            .with_initial("1")
            .with_marked(["3"])
            .into_deterministic();
        let spec = Automaton::builder("E")
            .with_transitions([("1", "b", "3")])
            .with_initial("1")
            .into_deterministic();
        let sup = plant.supremal_controllable(&spec);
        assert!(sup.contains_state("1"));
        assert!(sup.contains_state("3"));
        assert!(!sup.contains_state("2"));
        let q1 = sup.states().id("1").unwrap();
        assert_eq!(sup.transitions().transitions_from(q1).len(), 1);
    }

    #[test]
    fn result_never_disables_enabled_uncontrollable_events() {
        let plant = Automaton::builder("G")
            .with_transitions([("1", "a", "2"), ("2", "u", "3"), ("2", "c", "4")])
            .with_initial("1")
            .with_marked(["3"])
            .uncontrollable(["u"])
            .into_deterministic();
        let spec = Automaton::builder("E")
            .with_transitions([("1", "a", "2"), ("2", "u", "3")])
            .with_initial("1")
            .into_deterministic();
        let sup = plant.supremal_controllable(&spec);
        // the uncontrollable u stays enabled at 2, only the controllable c is cut
        let q2 = sup.states().id("2").unwrap();
        let u = sup.events().id("u").unwrap();
        assert!(sup.transitions().successors(q2, u).is_some());
        let c = sup.events().id("c").unwrap();
        assert!(sup.transitions().successors(q2, c).is_none());
    }

    #[test]
    fn disabled_events_propagate_across_unobservable_steps() {
        // 1 -tau-> 2 (unobservable), at 2 the controllable event c must be disabled;
        // the controller cannot tell 1 and 2 apart, so c is disabled at 1 as well
        let plant = Automaton::builder("G")
            .with_transitions([
                ("1", "tau", "2"),
                ("1", "c", "5"),
                ("2", "c", "3"),
                ("2", "m", "4"),
                ("1", "m", "4"),
                ("5", "m", "4"),
            ])
            .unobservable(["tau"])
            .with_initial("1")
            .with_marked(["4"])
            .into_deterministic();
        let spec = Automaton::builder("E")
            .with_transitions([
                ("1", "tau", "2"),
                ("1", "c", "5"),
                ("2", "m", "4"),
                ("1", "m", "4"),
                ("5", "m", "4"),
            ])
            .with_initial("1")
            .into_deterministic();
        let records = plant.disabled_events(&spec);
        let q1 = plant.states().id("1").unwrap();
        let c = plant.events().id("c").unwrap();
        match &records[&q1] {
            Disabled::Events(events) => assert!(events.contains(&c)),
            other => panic!("state 1 should survive with c disabled, got {other:?}"),
        }
    }

    #[test]
    fn cyclic_plants_finalize_every_state() {
        let plant = Automaton::builder("G")
            .with_transitions([("1", "a", "2"), ("2", "b", "1"), ("2", "c", "3")])
            .with_initial("1")
            .with_marked(["3"])
            .into_deterministic();
        let spec = Automaton::builder("E")
            .with_transitions([("1", "a", "2"), ("2", "b", "1"), ("2", "c", "3")])
            .with_initial("1")
            .into_deterministic();
        let records = plant.disabled_events(&spec);
        assert_eq!(records.len(), 3);
        assert!(records
            .values()
            .all(|d| matches!(d, Disabled::Events(e) if e.is_empty())));
    }
}
