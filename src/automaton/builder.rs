use crate::automaton::Automaton;
use crate::modal::ModalSpec;
use crate::transition::Shape;

/// Helper for the fluent construction of automata and modal specifications. This is
/// the main way tests put together fixtures; transitions are given as
/// `(from, event, to)` name triples and attributes as name lists.
///
/// # Example
///
/// ```
/// use supremal::prelude::*;
///
/// let g = Automaton::builder("G")
///     .with_transitions([("1", "a", "2"), ("2", "a", "3")])
///     .with_initial("1")
///     .with_marked(["3"])
///     .uncontrollable(["a"])
///     .into_deterministic();
/// assert_eq!(g.states().len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AutomatonBuilder {
    name: String,
    states: Vec<String>,
    transitions: Vec<(String, String, String)>,
    initial: Vec<String>,
    marked: Vec<String>,
    private: Vec<String>,
    uncontrollable: Vec<String>,
    unobservable: Vec<String>,
    attacker_unobservable: Vec<String>,
    must: Vec<(String, String, String)>,
}

impl AutomatonBuilder {
    /// Creates a builder for an automaton with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Declares states explicitly. Only needed for states that appear on no
    /// transition; endpoints of transitions are created on demand.
    pub fn with_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.states.extend(states.into_iter().map(Into::into));
        self
    }

    /// Adds (from, event, to) transitions.
    pub fn with_transitions<I, S>(mut self, transitions: I) -> Self
    where
        I: IntoIterator<Item = (S, S, S)>,
        S: Into<String>,
    {
        self.transitions.extend(
            transitions
                .into_iter()
                .map(|(q, e, p)| (q.into(), e.into(), p.into())),
        );
        self
    }

    /// Adds (from, event, to) must-transitions; only meaningful for
    /// [`into_modal`](Self::into_modal). Must-transitions without a matching may
    /// (ordinary) transition are legal here, pruning resolves them later.
    pub fn with_must_transitions<I, S>(mut self, transitions: I) -> Self
    where
        I: IntoIterator<Item = (S, S, S)>,
        S: Into<String>,
    {
        self.must.extend(
            transitions
                .into_iter()
                .map(|(q, e, p)| (q.into(), e.into(), p.into())),
        );
        self
    }

    /// Marks a state as initial. May be called repeatedly; the deterministic
    /// finishers keep only the last one.
    pub fn with_initial(mut self, state: impl Into<String>) -> Self {
        self.initial.push(state.into());
        self
    }

    /// Marks the given states (accepted language membership).
    pub fn with_marked<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.marked.extend(states.into_iter().map(Into::into));
        self
    }

    /// Flags the given states as private/secret.
    pub fn with_private<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.private.extend(states.into_iter().map(Into::into));
        self
    }

    /// Flags the given events as uncontrollable.
    pub fn uncontrollable<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uncontrollable
            .extend(events.into_iter().map(Into::into));
        self
    }

    /// Flags the given events as system-unobservable.
    pub fn unobservable<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unobservable.extend(events.into_iter().map(Into::into));
        self
    }

    /// Flags the given events as attacker-unobservable.
    pub fn attacker_unobservable<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attacker_unobservable
            .extend(events.into_iter().map(Into::into));
        self
    }

    fn build(self, shape: Shape) -> Automaton {
        let mut automaton = Automaton::new(self.name, shape);
        for state in &self.states {
            automaton.add_state(crate::state::State::new(state));
        }
        for (q, e, p) in &self.transitions {
            automaton.add_transition(q, e, p);
        }
        for (q, e, p) in &self.must {
            // make sure the endpoints exist even when only a must-transition uses them
            automaton.add_state(crate::state::State::new(q));
            automaton.add_event(crate::event::Event::new(e));
            automaton.add_state(crate::state::State::new(p));
        }
        for state in &self.marked {
            automaton.add_state(crate::state::State::new(state));
            automaton.set_marked(state, true);
        }
        for state in &self.private {
            automaton.add_state(crate::state::State::new(state));
            automaton.set_private(state, true);
        }
        for event in &self.uncontrollable {
            automaton.set_controllable(event, false);
        }
        for event in &self.unobservable {
            automaton.set_observable(event, false);
        }
        for event in &self.attacker_unobservable {
            automaton.set_attacker_observable(event, false);
        }
        for state in &self.initial {
            automaton.add_state(crate::state::State::new(state));
            automaton.set_initial(state);
        }
        automaton
    }

    /// Finishes into a deterministic automaton.
    pub fn into_deterministic(self) -> Automaton {
        self.build(Shape::Deterministic)
    }

    /// Finishes into a nondeterministic automaton.
    pub fn into_nondeterministic(self) -> Automaton {
        self.build(Shape::Nondeterministic)
    }

    /// Finishes into a modal specification: the ordinary transitions become the may
    /// function, the must triples the must function. Modal specifications are
    /// always deterministic.
    pub fn into_modal(self) -> ModalSpec {
        let must = self.must.clone();
        let automaton = self.build(Shape::Deterministic);
        let mut spec =
            ModalSpec::from_automaton(automaton).expect("builder produces deterministic shape");
        for (q, e, p) in &must {
            spec.add_must_transition(q, e, p);
        }
        spec
    }
}
