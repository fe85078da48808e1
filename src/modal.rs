use std::collections::VecDeque;

use tracing::debug;

use crate::automaton::Automaton;
use crate::error::Error;
use crate::event::Event;
use crate::math::{Map, OrderedSet, Set};
use crate::state::{State, StateId};
use crate::transition::{Shape, TransitionFn};

mod synthesis;

/// A modal specification: an automaton whose ordinary transition function is read as
/// the *may* transitions (what is permitted) together with a second *must* transition
/// function (what is required) over the same state and event registries.
///
/// The consistency invariant is that every must-transition triple has a matching
/// may-transition. A specification violating it is not in error, merely
/// *inconsistent*; [`ModalSpec::prune`] repairs it by excising the inconsistent
/// states. Modal specifications always have the deterministic shape; how the modal
/// operations should behave on nondeterministic automata is deliberately left
/// unresolved and rejected as input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalSpec {
    automaton: Automaton,
    must: TransitionFn,
}

impl ModalSpec {
    /// Creates an empty modal specification with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            automaton: Automaton::deterministic(name),
            must: TransitionFn::new(Shape::Deterministic),
        }
    }

    /// Wraps an existing automaton as the may view of a specification with no
    /// must-transitions. Rejects nondeterministic automata.
    pub fn from_automaton(automaton: Automaton) -> Result<Self, Error> {
        if !automaton.is_deterministic() {
            return Err(Error::NondeterministicSpecification);
        }
        Ok(Self {
            automaton,
            must: TransitionFn::new(Shape::Deterministic),
        })
    }

    /// The name of the specification.
    pub fn name(&self) -> &str {
        self.automaton.name()
    }

    /// The underlying ordinary automaton, i.e. the may view.
    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    /// The must transition function.
    pub fn must(&self) -> &TransitionFn {
        &self.must
    }

    /// Adds a may-transition by name, creating endpoints and event on demand.
    pub fn add_may_transition(&mut self, from: &str, event: &str, to: &str) {
        self.automaton.add_transition(from, event, to);
    }

    /// Removes a may-transition. The matching must-transition, if any, stays; this
    /// can leave the specification inconsistent until it is pruned.
    pub fn remove_may_transition(&mut self, from: &str, event: &str, to: &str) -> bool {
        self.automaton.remove_transition(from, event, to)
    }

    /// Adds a must-transition by name, creating endpoints and event on demand. The
    /// matching may-transition is *not* added automatically; an unmatched
    /// must-transition is legal transient state resolved by pruning.
    pub fn add_must_transition(&mut self, from: &str, event: &str, to: &str) {
        let q = self.automaton.states.add(State::new(from));
        let e = self.automaton.events.add(Event::new(event));
        let p = self.automaton.states.add(State::new(to));
        self.must.add(q, e, p);
    }

    /// Removes a must-transition. Returns whether it existed.
    pub fn remove_must_transition(&mut self, from: &str, event: &str, to: &str) -> bool {
        let (Some(q), Some(e), Some(p)) = (
            self.automaton.states.id(from),
            self.automaton.events.id(event),
            self.automaton.states.id(to),
        ) else {
            return false;
        };
        self.must.remove(q, e, p)
    }

    /// Removes a state from both transition functions, cascading as usual.
    pub fn remove_state(&mut self, name: &str) -> bool {
        let Some(id) = self.automaton.states.id(name) else {
            return false;
        };
        self.must.remove_state(id);
        self.automaton.remove_state(name)
    }

    /// Marks the named state initial (replacing the previous initial state).
    pub fn set_initial(&mut self, name: &str) -> bool {
        self.automaton.set_initial(name)
    }

    /// Sets the marked attribute of the named state.
    pub fn set_marked(&mut self, name: &str, marked: bool) -> bool {
        self.automaton.set_marked(name, marked)
    }

    /// The states at which some must-transition has no matching may-transition.
    pub fn inconsistent_states(&self) -> Set<StateId> {
        self.automaton.transitions().inconsistent_states(&self.must)
    }

    /// Whether every must-transition has a matching may-transition.
    pub fn is_consistent(&self) -> bool {
        self.inconsistent_states().is_empty()
    }

    /// Repairs an inconsistent specification by excising states.
    ///
    /// The inconsistent set is grown to a fixed point: a state with a
    /// must-transition into an already-excised state cannot satisfy that obligation
    /// and is excised as well. The survivors are then made accessible. Returns
    /// `None` when the initial state itself is excised, which means no compliant
    /// behavior exists at all; this is a normal negative result, not an error.
    pub fn prune(&self) -> Option<ModalSpec> {
        let mut excised = self.inconsistent_states();
        loop {
            let mut changed = false;
            for (q, t) in self.must.iter() {
                if excised.contains(&q) {
                    continue;
                }
                if t.targets().iter().any(|p| excised.contains(p)) {
                    excised.insert(q);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        debug!(
            "pruning {} excises {} of {} states",
            self.name(),
            excised.len(),
            self.automaton.states().len()
        );

        let excluded: Set<String> = excised
            .iter()
            .map(|&q| self.automaton.state_name(q).to_string())
            .collect();
        let mut may = self
            .automaton
            .restrict(self.name().to_string(), &excluded)
            .accessible();
        may.name = format!("prune({})", self.name());

        if !self.automaton.initial_states().is_empty() && may.initial_states().is_empty() {
            return None;
        }
        let must = remap_must(&self.automaton, &self.must, &may);
        Some(ModalSpec { automaton: may, must })
    }

    /// Computes the greatest lower bound of two specifications: the coarsest
    /// specification refining both. May-transitions are intersected on common
    /// events (and passed through for events private to one side, the other side's
    /// position unchanged); must-transitions are taken for the union of events that
    /// are a must on either side, using the other side's may-destination (or its
    /// current state) where it lacks the must. The merged result is pruned, so
    /// `None` again means the two specifications are incompatible from the start.
    pub fn glb(&self, other: &ModalSpec) -> Option<ModalSpec> {
        let l = &self.automaton;
        let r = &other.automaton;
        let (Some(li), Some(ri)) = (l.initial_state(), r.initial_state()) else {
            return None;
        };

        let mut may = Automaton::deterministic(format!("glb({},{})", l.name(), r.name()));
        for (_, event) in l.events.iter() {
            match r.events.id(event.name()) {
                Some(re) => {
                    may.events
                        .add(event.combine(r.events.get(re).expect("live id")));
                }
                None => {
                    may.events.add(event.clone());
                }
            }
        }
        for (_, event) in r.events.iter() {
            if l.events.id(event.name()).is_none() {
                may.events.add(event.clone());
            }
        }
        let mut must = TransitionFn::new(Shape::Deterministic);

        let mut visited: Map<(StateId, StateId), StateId> = Map::default();
        let mut queue: VecDeque<(StateId, StateId)> = VecDeque::new();
        let mut ensure_pair = |lq: StateId,
                               rq: StateId,
                               may: &mut Automaton,
                               queue: &mut VecDeque<(StateId, StateId)>,
                               visited: &mut Map<(StateId, StateId), StateId>|
         -> StateId {
            if let Some(&id) = visited.get(&(lq, rq)) {
                return id;
            }
            let ls = l.states.get(lq).expect("live id");
            let rs = r.states.get(rq).expect("live id");
            let id = may.add_state(
                State::new(format!("({},{})", ls.name(), rs.name()))
                    .with_marked(ls.is_marked() && rs.is_marked())
                    .with_private(ls.is_private() && rs.is_private()),
            );
            may.record_composition(
                id,
                OrderedSet::from([ls.name().to_string(), rs.name().to_string()]),
            );
            visited.insert((lq, rq), id);
            queue.push_back((lq, rq));
            id
        };

        let init = ensure_pair(li, ri, &mut may, &mut queue, &mut visited);
        may.initial.insert(init);

        while let Some((lq, rq)) = queue.pop_front() {
            let source = visited[&(lq, rq)];
            // may: intersection on common events, pass-through on one-sided events
            for t in l.transitions.transitions_from(lq) {
                let Some(lp) = t.target() else { continue };
                let event_name = l.event_name(t.event());
                match r.events.id(event_name) {
                    Some(re) => {
                        if let Some(rp) =
                            r.transitions.successors(rq, re).and_then(|s| s.iter().next())
                        {
                            let target =
                                ensure_pair(lp, *rp, &mut may, &mut queue, &mut visited);
                            let e = may.events.id(event_name).expect("event added");
                            may.transitions.add(source, e, target);
                        }
                    }
                    None => {
                        let target = ensure_pair(lp, rq, &mut may, &mut queue, &mut visited);
                        let e = may.events.id(event_name).expect("event added");
                        may.transitions.add(source, e, target);
                    }
                }
            }
            for t in r.transitions.transitions_from(rq) {
                let Some(rp) = t.target() else { continue };
                let event_name = r.event_name(t.event());
                if l.events.id(event_name).is_some() {
                    continue;
                }
                let target = ensure_pair(lq, rp, &mut may, &mut queue, &mut visited);
                let e = may.events.id(event_name).expect("event added");
                may.transitions.add(source, e, target);
            }
            // must: union over the events either side requires
            let mut must_events: OrderedSet<String> = OrderedSet::new();
            for t in self.must.transitions_from(lq) {
                must_events.insert(l.event_name(t.event()).to_string());
            }
            for t in other.must.transitions_from(rq) {
                must_events.insert(r.event_name(t.event()).to_string());
            }
            for event_name in must_events {
                let lnext = modal_destination(self, lq, &event_name);
                let rnext = modal_destination(other, rq, &event_name);
                let target = ensure_pair(lnext, rnext, &mut may, &mut queue, &mut visited);
                let e = may.events.id(&event_name).expect("event added");
                must.add(source, e, target);
            }
        }

        ModalSpec { automaton: may, must }.prune()
    }
}

/// Where `spec` moves from `q` on the named event: the must-destination when the
/// event is required there, otherwise the may-destination, otherwise `q` itself.
fn modal_destination(spec: &ModalSpec, q: StateId, event_name: &str) -> StateId {
    let Some(e) = spec.automaton.events.id(event_name) else {
        return q;
    };
    spec.must
        .successors(q, e)
        .or_else(|| spec.automaton.transitions.successors(q, e))
        .and_then(|targets| targets.iter().next().copied())
        .unwrap_or(q)
}

/// Rebuilds a must transition function against the registries of a fresh copy of
/// the automaton, matching states and events by name and silently dropping triples
/// whose endpoints did not survive.
fn remap_must(old: &Automaton, must: &TransitionFn, new: &Automaton) -> TransitionFn {
    let mut out = TransitionFn::new(new.shape());
    for (q, t) in must.iter() {
        let Some(nq) = new.states.id(old.state_name(q)) else {
            continue;
        };
        let Some(ne) = new.events.id(old.event_name(t.event())) else {
            continue;
        };
        for &p in t.targets() {
            if let Some(np) = new.states.id(old.state_name(p)) {
                out.add(nq, ne, np);
            }
        }
    }
    out
}
