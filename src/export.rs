//! The transition-list exchange shape consumed by external collaborators
//! (serializers, visualizers, generators): plain (from, to, event) triples plus
//! the per-state and per-event attribute groups.

use std::fmt;

use itertools::Itertools;

use crate::automaton::Automaton;
use crate::event::{Event, EventRegistry};
use crate::modal::ModalSpec;
use crate::state::{State, StateRegistry};
use crate::transition::{Shape, TransitionFn};

/// An automaton flattened to lists of names and triples, in sorted order so the
/// rendering is deterministic. Plain automata carry six attribute groups; modal
/// specifications additionally carry their must-transition triples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionList {
    /// Names of initial states.
    pub initial: Vec<String>,
    /// Names of marked states.
    pub marked: Vec<String>,
    /// Names of private states.
    pub private: Vec<String>,
    /// Names of events the system cannot observe.
    pub unobservable: Vec<String>,
    /// Names of events the attacker cannot observe.
    pub attacker_unobservable: Vec<String>,
    /// Names of uncontrollable events.
    pub uncontrollable: Vec<String>,
    /// Must-transition triples, present only for modal specifications.
    pub must: Option<Vec<(String, String, String)>>,
    /// The (from, to, event) transition triples.
    pub transitions: Vec<(String, String, String)>,
}

fn sorted_triples(
    transitions: &TransitionFn,
    states: &StateRegistry,
    events: &EventRegistry,
) -> Vec<(String, String, String)> {
    transitions
        .iter()
        .flat_map(|(q, t)| {
            t.targets().iter().map(move |&p| {
                (
                    states.name_of(q).to_string(),
                    states.name_of(p).to_string(),
                    events.name_of(t.event()).to_string(),
                )
            })
        })
        .sorted()
        .collect()
}

impl Automaton {
    /// Flattens this automaton into a [`TransitionList`] with `must: None`.
    pub fn export(&self) -> TransitionList {
        let state_names = |pred: fn(&State) -> bool| -> Vec<String> {
            self.states()
                .iter()
                .filter(|(_, s)| pred(s))
                .map(|(_, s)| s.name().to_string())
                .sorted()
                .collect()
        };
        let event_names = |pred: fn(&Event) -> bool| -> Vec<String> {
            self.events()
                .iter()
                .filter(|(_, e)| pred(e))
                .map(|(_, e)| e.name().to_string())
                .sorted()
                .collect()
        };
        TransitionList {
            initial: self
                .initial_states()
                .iter()
                .map(|&q| self.states().name_of(q).to_string())
                .sorted()
                .collect(),
            marked: state_names(State::is_marked),
            private: state_names(State::is_private),
            unobservable: event_names(|e| !e.is_observable()),
            attacker_unobservable: event_names(|e| !e.is_attacker_observable()),
            uncontrollable: event_names(|e| !e.is_controllable()),
            must: None,
            transitions: sorted_triples(self.transitions(), self.states(), self.events()),
        }
    }

    /// Rebuilds an automaton of the given shape from a transition list. States and
    /// events are created as the triples mention them; names appearing only in
    /// attribute groups become isolated states.
    pub fn from_transition_list(
        name: impl Into<String>,
        shape: Shape,
        list: &TransitionList,
    ) -> Automaton {
        let mut result = Automaton::new(name, shape);
        for (from, to, event) in &list.transitions {
            result.add_transition(from, event, to);
        }
        for name in list
            .initial
            .iter()
            .chain(&list.marked)
            .chain(&list.private)
        {
            result.add_state(State::new(name.as_str()));
        }
        for name in &list.initial {
            result.set_initial(name);
        }
        for name in &list.marked {
            result.set_marked(name, true);
        }
        for name in &list.private {
            result.set_private(name, true);
        }
        for name in &list.unobservable {
            result.add_event(Event::new(name.as_str()));
            result.set_observable(name, false);
        }
        for name in &list.attacker_unobservable {
            result.add_event(Event::new(name.as_str()));
            result.set_attacker_observable(name, false);
        }
        for name in &list.uncontrollable {
            result.add_event(Event::new(name.as_str()));
            result.set_controllable(name, false);
        }
        result
    }
}

impl ModalSpec {
    /// Flattens this specification into a [`TransitionList`] whose `must` group
    /// holds the must-transition triples.
    pub fn export(&self) -> TransitionList {
        let mut list = self.automaton().export();
        list.must = Some(sorted_triples(
            self.must(),
            self.automaton().states(),
            self.automaton().events(),
        ));
        list
    }

    /// Rebuilds a modal specification from a transition list; a missing `must`
    /// group is treated as empty.
    pub fn from_transition_list(name: impl Into<String>, list: &TransitionList) -> ModalSpec {
        let automaton = Automaton::from_transition_list(name, Shape::Deterministic, list);
        let mut spec =
            ModalSpec::from_automaton(automaton).expect("deterministic by construction");
        for (from, to, event) in list.must.iter().flatten() {
            spec.add_must_transition(from, event, to);
        }
        spec
    }
}

/// The text shape of the persistence format: a header line with the number of
/// attribute groups, each group as a count followed by that many lines, then the
/// transitions one per line as `fromState toState eventName`.
impl fmt::Display for TransitionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", 6 + usize::from(self.must.is_some()))?;
        for group in [
            &self.initial,
            &self.marked,
            &self.private,
            &self.unobservable,
            &self.attacker_unobservable,
            &self.uncontrollable,
        ] {
            writeln!(f, "{}", group.len())?;
            for name in group {
                writeln!(f, "{name}")?;
            }
        }
        if let Some(must) = &self.must {
            writeln!(f, "{}", must.len())?;
            for (from, to, event) in must {
                writeln!(f, "{from} {to} {event}")?;
            }
        }
        for (from, to, event) in &self.transitions {
            writeln!(f, "{from} {to} {event}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Automaton {
        Automaton::builder("G")
            .with_transitions([("1", "a", "2"), ("2", "tau", "3"), ("3", "b", "1")])
            .with_initial("1")
            .with_marked(["1"])
            .with_private(["3"])
            .unobservable(["tau"])
            .uncontrollable(["b"])
            .into_deterministic()
    }

    #[test]
    fn export_collects_sorted_attribute_groups() {
        let list = fixture().export();
        assert_eq!(list.initial, vec!["1"]);
        assert_eq!(list.marked, vec!["1"]);
        assert_eq!(list.private, vec!["3"]);
        assert_eq!(list.unobservable, vec!["tau"]);
        assert!(list.attacker_unobservable.is_empty());
        assert_eq!(list.uncontrollable, vec!["b"]);
        assert_eq!(list.must, None);
        assert_eq!(
            list.transitions,
            vec![
                ("1".to_string(), "2".to_string(), "a".to_string()),
                ("2".to_string(), "3".to_string(), "tau".to_string()),
                ("3".to_string(), "1".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn display_renders_the_persistence_shape() {
        let rendered = fixture().export().to_string();
        let expected = "6\n\
                        1\n1\n\
                        1\n1\n\
                        1\n3\n\
                        1\ntau\n\
                        0\n\
                        1\nb\n\
                        1 2 a\n\
                        2 3 tau\n\
                        3 1 b\n";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn rebuilding_from_a_list_restores_all_attributes() {
        let g = fixture();
        let rebuilt = Automaton::from_transition_list("G", Shape::Deterministic, &g.export());
        assert_eq!(rebuilt.export(), g.export());
        assert!(rebuilt.is_deterministic());
        let tau = rebuilt.events().id("tau").unwrap();
        assert!(!rebuilt.events().get(tau).unwrap().is_observable());
    }

    #[test]
    fn attribute_only_names_become_isolated_states() {
        let list = TransitionList {
            initial: vec!["lonely".to_string()],
            marked: vec!["lonely".to_string()],
            ..TransitionList::default()
        };
        let g = Automaton::from_transition_list("G", Shape::Deterministic, &list);
        assert!(g.contains_state("lonely"));
        assert!(g.initial_state().is_some());
    }

    #[test]
    fn modal_export_carries_the_must_triples() {
        let spec = Automaton::builder("S")
            .with_transitions([("s0", "a", "s1"), ("s1", "b", "s0")])
            .with_must_transitions([("s0", "a", "s1")])
            .with_initial("s0")
            .into_modal();
        let list = spec.export();
        assert_eq!(
            list.must,
            Some(vec![("s0".to_string(), "s1".to_string(), "a".to_string())])
        );
        assert!(list.to_string().starts_with("7\n"));

        let rebuilt = ModalSpec::from_transition_list("S", &list);
        assert_eq!(rebuilt.export(), list);
    }
}
