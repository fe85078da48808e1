use std::collections::VecDeque;

use crate::event::{Event, EventId, EventRegistry};
use crate::math::{Map, OrderedSet, Set};
use crate::state::StateId;

/// Distinguishes the two transition representations. This tag replaces a class
/// hierarchy: the same [`TransitionFn`] serves both shapes, only the behavior of
/// [`TransitionFn::add`] differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// At most one target per (state, event); adding a second target for the same
    /// event overwrites the first.
    Deterministic,
    /// Target sets accumulate.
    Nondeterministic,
}

/// An (event, target-state-set) pair attached to some source state. In a
/// deterministic transition function the target set holds at most one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    event: EventId,
    targets: OrderedSet<StateId>,
}

impl Transition {
    /// Creates a transition on `event` with a single target.
    pub fn new(event: EventId, target: StateId) -> Self {
        Self {
            event,
            targets: OrderedSet::from([target]),
        }
    }

    /// The event this transition is taken on.
    pub fn event(&self) -> EventId {
        self.event
    }

    /// The set of target states.
    pub fn targets(&self) -> &OrderedSet<StateId> {
        &self.targets
    }

    /// The unique target, for use on deterministic transition functions where the
    /// set is known to be a singleton.
    pub fn target(&self) -> Option<StateId> {
        self.targets.iter().next().copied()
    }
}

/// Maps each state to the ordered collection of its outgoing transitions.
///
/// Lookup by (state, event) is a linear scan of the transitions at that state, so it
/// costs O(transitions-at-state). States without outgoing transitions simply have no
/// entry; [`TransitionFn::transitions_from`] returns an empty slice for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionFn {
    shape: Shape,
    map: Map<StateId, Vec<Transition>>,
}

impl TransitionFn {
    /// Creates an empty transition function of the given shape.
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            map: Map::default(),
        }
    }

    /// The transition shape this function enforces.
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// The outgoing transitions of `state`, empty (not absent) when there are none.
    pub fn transitions_from(&self, state: StateId) -> &[Transition] {
        self.map.get(&state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The targets reached from `state` on `event`, if such a transition exists.
    pub fn successors(&self, state: StateId, event: EventId) -> Option<&OrderedSet<StateId>> {
        self.transitions_from(state)
            .iter()
            .find(|t| t.event == event)
            .map(|t| &t.targets)
    }

    /// Adds a transition from `state` on `event` to `target`. When a transition on
    /// the same event already exists, the deterministic shape overwrites its target
    /// while the nondeterministic shape unions the target in.
    pub fn add(&mut self, state: StateId, event: EventId, target: StateId) {
        let list = self.map.entry(state).or_default();
        match list.iter_mut().find(|t| t.event == event) {
            Some(existing) => match self.shape {
                Shape::Deterministic => {
                    existing.targets.clear();
                    existing.targets.insert(target);
                }
                Shape::Nondeterministic => {
                    existing.targets.insert(target);
                }
            },
            None => list.push(Transition::new(event, target)),
        }
    }

    /// Removes `target` from the transition of `state` on `event`, dropping the
    /// transition entirely when its target set empties. Returns whether anything
    /// was removed.
    pub fn remove(&mut self, state: StateId, event: EventId, target: StateId) -> bool {
        let Some(list) = self.map.get_mut(&state) else {
            return false;
        };
        let Some(pos) = list.iter().position(|t| t.event == event) else {
            return false;
        };
        if !list[pos].targets.remove(&target) {
            return false;
        }
        if list[pos].targets.is_empty() {
            list.remove(pos);
        }
        if list.is_empty() {
            self.map.remove(&state);
        }
        true
    }

    /// Removes `state` from the function: its own outgoing transitions are dropped
    /// and it is stripped as a target from every other transition, dropping
    /// transitions whose target set empties.
    pub fn remove_state(&mut self, state: StateId) {
        self.map.remove(&state);
        self.map.retain(|_, list| {
            list.retain_mut(|t| {
                t.targets.remove(&state);
                !t.targets.is_empty()
            });
            !list.is_empty()
        });
    }

    /// Iterates over all (source, transition) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (StateId, &Transition)> + '_ {
        self.map
            .iter()
            .flat_map(|(&q, list)| list.iter().map(move |t| (q, t)))
    }

    /// The number of (source, event, target) triples.
    pub fn triple_count(&self) -> usize {
        self.map
            .values()
            .flat_map(|list| list.iter())
            .map(|t| t.targets.len())
            .sum()
    }

    /// Whether the function holds no transitions at all.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Computes the epsilon-closure of every state in `seeds`: the set of states
    /// reachable by following only transitions whose event is system-unobservable,
    /// always including the seed itself. This is the workhorse of every observer
    /// construction.
    pub fn epsilon_reach<I>(
        &self,
        seeds: I,
        events: &EventRegistry,
    ) -> Map<StateId, OrderedSet<StateId>>
    where
        I: IntoIterator<Item = StateId>,
    {
        let mut closures = Map::default();
        for seed in seeds {
            let mut closure = OrderedSet::from([seed]);
            let mut queue = VecDeque::from([seed]);
            while let Some(q) = queue.pop_front() {
                for t in self.transitions_from(q) {
                    let observable = events.get(t.event).map_or(true, Event::is_observable);
                    if observable {
                        continue;
                    }
                    for &p in t.targets() {
                        if closure.insert(p) {
                            queue.push_back(p);
                        }
                    }
                }
            }
            closures.insert(seed, closure);
        }
        closures
    }

    /// Determines the states at which `must` demands a transition that `self` (the
    /// may function) does not provide. Both transition lists are flattened to
    /// (event, target) pairs, sorted, and walked in merge order; any must pair
    /// without a matching may pair marks its source state inconsistent.
    pub fn inconsistent_states(&self, must: &TransitionFn) -> Set<StateId> {
        let mut inconsistent = Set::default();
        for (&q, _) in must.map.iter() {
            let mut may_pairs = flatten(self.transitions_from(q));
            let mut must_pairs = flatten(must.transitions_from(q));
            may_pairs.sort_unstable();
            must_pairs.sort_unstable();

            let mut may_it = may_pairs.into_iter().peekable();
            for pair in must_pairs {
                while may_it.peek().is_some_and(|&m| m < pair) {
                    may_it.next();
                }
                if may_it.peek() != Some(&pair) {
                    inconsistent.insert(q);
                    break;
                }
            }
        }
        inconsistent
    }
}

fn flatten(transitions: &[Transition]) -> Vec<(EventId, StateId)> {
    transitions
        .iter()
        .flat_map(|t| t.targets().iter().map(move |&p| (t.event(), p)))
        .collect()
}
