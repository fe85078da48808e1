use itertools::Itertools;
use owo_colors::OwoColorize;

use crate::event::{Event, EventId, EventRegistry};
use crate::math::{Map, OrderedSet, Set};
use crate::state::{State, StateId, StateRegistry};
use crate::transition::{Shape, TransitionFn};

mod builder;
pub use builder::AutomatonBuilder;

/// A finite automaton over event-labeled transitions: a state registry, an event
/// registry, a transition function and an identifying name.
///
/// The deterministic/nondeterministic distinction is carried by the [`Shape`] tag
/// rather than by separate types. A deterministic automaton has at most one initial
/// state and at most one target per (state, event); the nondeterministic shape lifts
/// both restrictions. All analysis algorithms (accessibility, observer construction,
/// composition, synthesis) produce fresh automata and never mutate their inputs; the
/// by-name mutators on this type exist for interactive editing and for building
/// automata up from scratch.
#[derive(Clone, PartialEq, Eq)]
pub struct Automaton {
    pub(crate) name: String,
    pub(crate) shape: Shape,
    pub(crate) states: StateRegistry,
    pub(crate) events: EventRegistry,
    pub(crate) transitions: TransitionFn,
    pub(crate) initial: OrderedSet<StateId>,
    pub(crate) compositions: Map<StateId, OrderedSet<String>>,
}

impl Automaton {
    /// Creates an empty automaton with the given name and shape.
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            states: StateRegistry::new(),
            events: EventRegistry::new(),
            transitions: TransitionFn::new(shape),
            initial: OrderedSet::new(),
            compositions: Map::default(),
        }
    }

    /// Creates an empty deterministic automaton.
    pub fn deterministic(name: impl Into<String>) -> Self {
        Self::new(name, Shape::Deterministic)
    }

    /// Creates an empty nondeterministic automaton.
    pub fn nondeterministic(name: impl Into<String>) -> Self {
        Self::new(name, Shape::Nondeterministic)
    }

    /// Returns a builder for fluent construction, mainly used by tests.
    pub fn builder(name: impl Into<String>) -> AutomatonBuilder {
        AutomatonBuilder::new(name)
    }

    /// The name of this automaton.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The transition shape.
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Whether this automaton has the deterministic shape.
    pub fn is_deterministic(&self) -> bool {
        self.shape == Shape::Deterministic
    }

    /// The state registry.
    pub fn states(&self) -> &StateRegistry {
        &self.states
    }

    /// The event registry.
    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    /// The transition function.
    pub fn transitions(&self) -> &TransitionFn {
        &self.transitions
    }

    /// Adds a state from a template, returning the canonical id (idempotent by name).
    pub fn add_state(&mut self, template: State) -> StateId {
        self.states.add(template)
    }

    /// Adds an event from a template, returning the canonical id (idempotent by name).
    pub fn add_event(&mut self, template: Event) -> EventId {
        self.events.add(template)
    }

    /// Adds a transition by name, creating missing states and the event on demand
    /// with default attributes.
    pub fn add_transition(&mut self, from: &str, event: &str, to: &str) {
        let q = self.states.add(State::new(from));
        let e = self.events.add(Event::new(event));
        let p = self.states.add(State::new(to));
        self.transitions.add(q, e, p);
    }

    /// Removes the transition identified by the (from, event, to) triple. Returns
    /// whether such a transition existed.
    pub fn remove_transition(&mut self, from: &str, event: &str, to: &str) -> bool {
        let (Some(q), Some(e), Some(p)) = (
            self.states.id(from),
            self.events.id(event),
            self.states.id(to),
        ) else {
            return false;
        };
        self.transitions.remove(q, e, p)
    }

    /// Removes the named state, cascading through the transition function: its own
    /// outgoing transitions are dropped and it is stripped as a target everywhere.
    /// Returns whether the state existed.
    pub fn remove_state(&mut self, name: &str) -> bool {
        let Some(id) = self.states.id(name) else {
            return false;
        };
        self.transitions.remove_state(id);
        self.initial.remove(&id);
        self.compositions.remove(&id);
        self.states.remove(id);
        true
    }

    /// Marks the named state initial. On a deterministic automaton this replaces the
    /// previous initial state. Returns whether the state existed.
    pub fn set_initial(&mut self, name: &str) -> bool {
        let Some(id) = self.states.id(name) else {
            return false;
        };
        if self.is_deterministic() {
            self.initial.clear();
        }
        self.initial.insert(id);
        true
    }

    /// Removes the named state from the initial set. Returns whether it was initial.
    pub fn unset_initial(&mut self, name: &str) -> bool {
        self.states
            .id(name)
            .is_some_and(|id| self.initial.remove(&id))
    }

    /// The set of initial states (at most one element for the deterministic shape).
    pub fn initial_states(&self) -> &OrderedSet<StateId> {
        &self.initial
    }

    /// The distinguished initial state of a deterministic automaton, if set.
    pub fn initial_state(&self) -> Option<StateId> {
        self.initial.iter().next().copied()
    }

    /// Whether the given state is initial.
    pub fn is_initial(&self, id: StateId) -> bool {
        self.initial.contains(&id)
    }

    /// Whether a state with the given name exists.
    pub fn contains_state(&self, name: &str) -> bool {
        self.states.contains(name)
    }

    /// Sets the marked attribute of the named state. Returns whether it existed.
    pub fn set_marked(&mut self, name: &str, marked: bool) -> bool {
        self.with_state_mut(name, |s| s.set_marked(marked))
    }

    /// Sets the private attribute of the named state. Returns whether it existed.
    pub fn set_private(&mut self, name: &str, private: bool) -> bool {
        self.with_state_mut(name, |s| s.set_private(private))
    }

    /// Sets the bad scratch flag of the named state. Returns whether it existed.
    pub fn set_bad(&mut self, name: &str, bad: bool) -> bool {
        self.with_state_mut(name, |s| s.set_bad(bad))
    }

    fn with_state_mut(&mut self, name: &str, f: impl FnOnce(&mut State)) -> bool {
        match self.states.id(name).and_then(|id| self.states.get_mut(id)) {
            Some(state) => {
                f(state);
                true
            }
            None => false,
        }
    }

    /// Sets controllability of the named event. Returns whether it existed.
    pub fn set_controllable(&mut self, name: &str, controllable: bool) -> bool {
        self.with_event_mut(name, |e| e.set_controllable(controllable))
    }

    /// Sets system observability of the named event. Returns whether it existed.
    pub fn set_observable(&mut self, name: &str, observable: bool) -> bool {
        self.with_event_mut(name, |e| e.set_observable(observable))
    }

    /// Sets attacker observability of the named event. Returns whether it existed.
    pub fn set_attacker_observable(&mut self, name: &str, attacker_observable: bool) -> bool {
        self.with_event_mut(name, |e| e.set_attacker_observable(attacker_observable))
    }

    fn with_event_mut(&mut self, name: &str, f: impl FnOnce(&mut Event)) -> bool {
        match self.events.id(name).and_then(|id| self.events.get_mut(id)) {
            Some(event) => {
                f(event);
                true
            }
            None => false,
        }
    }

    /// The composition of a state: the source-automaton states that were merged to
    /// produce it. Defaults to "composed of itself" when no composition was recorded.
    pub fn composition_of(&self, id: StateId) -> OrderedSet<String> {
        self.compositions.get(&id).cloned().unwrap_or_else(|| {
            OrderedSet::from([self.states.name_of(id).to_string()])
        })
    }

    pub(crate) fn record_composition(&mut self, id: StateId, of: OrderedSet<String>) {
        self.compositions.insert(id, of);
    }

    /// An empty automaton sharing this one's shape, used by algorithms that build a
    /// fresh result.
    pub(crate) fn empty_like(&self, name: impl Into<String>) -> Automaton {
        Automaton::new(name, self.shape)
    }

    /// Copies an event (with its attributes) from another automaton into this one.
    pub(crate) fn adopt_event(&mut self, other: &Automaton, event: EventId) -> EventId {
        self.events
            .add(other.events.get(event).expect("stale event id").clone())
    }

    /// Copies a state (with its attributes and composition, but not its initial
    /// status) from another automaton into this one.
    pub(crate) fn adopt_state(&mut self, other: &Automaton, state: StateId) -> StateId {
        let id = self
            .states
            .add(other.states.get(state).expect("stale state id").clone());
        if let Some(of) = other.compositions.get(&state) {
            self.compositions.insert(id, of.clone());
        }
        id
    }

    /// Builds a copy of this automaton containing only the states whose names are
    /// *not* in `excluded`. Transitions are truncated to surviving targets and
    /// dropped when their target set empties; the initial set is intersected with
    /// the survivors. Several algorithms use this as their final step.
    pub fn restrict(&self, name: impl Into<String>, excluded: &Set<String>) -> Automaton {
        let mut result = self.empty_like(name);
        let keep: OrderedSet<StateId> = self
            .states
            .iter()
            .filter(|(_, s)| !excluded.contains(s.name()))
            .map(|(id, _)| id)
            .collect();
        for (_, event) in self.events.iter() {
            result.events.add(event.clone());
        }
        for &id in &keep {
            let new_id = result.adopt_state(self, id);
            if self.initial.contains(&id) {
                result.initial.insert(new_id);
            }
        }
        for &id in &keep {
            let new_q = result.states.id(self.states.name_of(id)).expect("just added");
            for t in self.transitions.transitions_from(id) {
                let new_e = result
                    .events
                    .id(self.events.name_of(t.event()))
                    .expect("all events copied");
                for &target in t.targets() {
                    if !keep.contains(&target) {
                        continue;
                    }
                    let new_p = result
                        .states
                        .id(self.states.name_of(target))
                        .expect("just added");
                    result.transitions.add(new_q, new_e, new_p);
                }
            }
        }
        result
    }

    /// The name of the state at `id`. Panics on a stale id.
    pub(crate) fn state_name(&self, id: StateId) -> &str {
        self.states.name_of(id)
    }

    /// The name of the event at `id`. Panics on a stale id.
    pub(crate) fn event_name(&self, id: EventId) -> &str {
        self.events.name_of(id)
    }

    /// Renders the transition table as a string: one row per state, one column per
    /// event. Initial states carry a `->` prefix, marked states a `*` suffix; states
    /// flagged bad by a blocking check are highlighted in red so that interactive
    /// use can spot them.
    pub fn transition_table(&self) -> String {
        let events = self
            .events
            .iter()
            .sorted_by_key(|(_, e)| e.name().to_string())
            .collect_vec();
        let mut builder = tabled::builder::Builder::default();
        builder.push_record(
            std::iter::once("state".to_string()).chain(events.iter().map(|(_, e)| {
                e.name().to_string()
            })),
        );
        for (id, state) in self
            .states
            .iter()
            .sorted_by_key(|(_, s)| s.name().to_string())
        {
            let mut label = format!(
                "{}{}{}",
                if self.is_initial(id) { "->" } else { "" },
                state.name(),
                if state.is_marked() { "*" } else { "" }
            );
            if state.is_bad() {
                label = label.red().to_string();
            }
            let mut row = vec![label];
            for &(e, _) in &events {
                match self.transitions.successors(id, e) {
                    Some(targets) => row.push(
                        targets
                            .iter()
                            .map(|&p| self.states.name_of(p))
                            .join(","),
                    ),
                    None => row.push("-".to_string()),
                }
            }
            builder.push_record(row);
        }
        builder
            .build()
            .with(tabled::settings::Style::rounded())
            .to_string()
    }
}

impl std::fmt::Debug for Automaton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} ({:?})", self.name, self.shape)?;
        write!(f, "{}", self.transition_table())
    }
}
