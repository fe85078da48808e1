use std::collections::VecDeque;

use tracing::trace;

use crate::automaton::Automaton;
use crate::math::{Map, OrderedSet};
use crate::state::{State, StateId};
use crate::transition::Shape;

/// The three ways of combining two automata over the shared cross-product driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composition {
    /// Fully synchronous: only events present in both automata survive, taken
    /// jointly. A pair is marked when both components are marked.
    Product,
    /// Shared events synchronize, private events (absent from the other automaton)
    /// interleave. A pair is marked when both components are marked.
    Parallel,
    /// Same pair graph as [`Composition::Parallel`], but a pair is marked when
    /// either component is marked.
    Union,
}

impl Composition {
    fn keeps_private_events(self) -> bool {
        !matches!(self, Composition::Product)
    }

    fn marks(self, left: bool, right: bool) -> bool {
        match self {
            Composition::Product | Composition::Parallel => left && right,
            Composition::Union => left || right,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Composition::Product => "prod",
            Composition::Parallel => "par",
            Composition::Union => "union",
        }
    }
}

impl Automaton {
    /// Synchronous product of two automata; see [`Composition::Product`].
    pub fn product(&self, other: &Automaton) -> Automaton {
        compose_with_pairs(self, other, Composition::Product).0
    }

    /// Parallel composition of two automata; see [`Composition::Parallel`].
    pub fn parallel(&self, other: &Automaton) -> Automaton {
        compose_with_pairs(self, other, Composition::Parallel).0
    }

    /// Union of two automata; see [`Composition::Union`].
    pub fn union(&self, other: &Automaton) -> Automaton {
        compose_with_pairs(self, other, Composition::Union).0
    }
}

/// The generic cross-product driver behind union, product and parallel composition.
///
/// Walks pairs of states starting from all (initial, initial) combinations with a
/// worklist and a visited set keyed by the pair, so the reachable set of pairs does
/// not depend on traversal order. Pair states are named `(left,right)` and record
/// both source names as their composition; a combined event takes the AND of the
/// two attribute sets. Besides the result this returns, for every product state,
/// the pair of component ids it was built from, which synthesis needs to look
/// inside product states.
pub(crate) fn compose_with_pairs(
    left: &Automaton,
    right: &Automaton,
    kind: Composition,
) -> (Automaton, Map<StateId, (StateId, StateId)>) {
    let shape = if left.is_deterministic() && right.is_deterministic() {
        Shape::Deterministic
    } else {
        Shape::Nondeterministic
    };
    let mut result = Automaton::new(
        format!("{}({},{})", kind.tag(), left.name(), right.name()),
        shape,
    );

    // shared events carry AND-combined attributes, private events (if kept) copy over
    for (_, event) in left.events.iter() {
        match right.events.id(event.name()) {
            Some(r) => {
                result
                    .events
                    .add(event.combine(right.events.get(r).expect("live id")));
            }
            None if kind.keeps_private_events() => {
                result.events.add(event.clone());
            }
            None => {}
        }
    }
    if kind.keeps_private_events() {
        for (_, event) in right.events.iter() {
            if left.events.id(event.name()).is_none() {
                result.events.add(event.clone());
            }
        }
    }

    let mut pairs: Map<StateId, (StateId, StateId)> = Map::default();
    let mut visited: Map<(StateId, StateId), StateId> = Map::default();
    let mut queue: VecDeque<(StateId, StateId)> = VecDeque::new();

    let mut ensure_pair = |lq: StateId,
                           rq: StateId,
                           result: &mut Automaton,
                           queue: &mut VecDeque<(StateId, StateId)>,
                           pairs: &mut Map<StateId, (StateId, StateId)>,
                           visited: &mut Map<(StateId, StateId), StateId>|
     -> StateId {
        if let Some(&id) = visited.get(&(lq, rq)) {
            return id;
        }
        let ls = left.states.get(lq).expect("live id");
        let rs = right.states.get(rq).expect("live id");
        let id = result.add_state(
            State::new(format!("({},{})", ls.name(), rs.name()))
                .with_marked(kind.marks(ls.is_marked(), rs.is_marked()))
                .with_private(ls.is_private() && rs.is_private()),
        );
        result.record_composition(
            id,
            OrderedSet::from([ls.name().to_string(), rs.name().to_string()]),
        );
        visited.insert((lq, rq), id);
        pairs.insert(id, (lq, rq));
        queue.push_back((lq, rq));
        id
    };

    for &lq in left.initial.iter() {
        for &rq in right.initial.iter() {
            let id = ensure_pair(lq, rq, &mut result, &mut queue, &mut pairs, &mut visited);
            result.initial.insert(id);
        }
    }

    while let Some((lq, rq)) = queue.pop_front() {
        let source = visited[&(lq, rq)];
        // synchronous steps on shared events, plus left-private interleavings
        for t in left.transitions.transitions_from(lq) {
            let event_name = left.event_name(t.event());
            match right.events.id(event_name) {
                Some(re) => {
                    let Some(r_targets) = right.transitions.successors(rq, re) else {
                        continue;
                    };
                    let e = result.events.id(event_name).expect("shared event added");
                    for &lp in t.targets() {
                        for &rp in r_targets {
                            let target = ensure_pair(
                                lp,
                                rp,
                                &mut result,
                                &mut queue,
                                &mut pairs,
                                &mut visited,
                            );
                            result.transitions.add(source, e, target);
                        }
                    }
                }
                None if kind.keeps_private_events() => {
                    let e = result.events.id(event_name).expect("private event added");
                    for &lp in t.targets() {
                        let target = ensure_pair(
                            lp,
                            rq,
                            &mut result,
                            &mut queue,
                            &mut pairs,
                            &mut visited,
                        );
                        result.transitions.add(source, e, target);
                    }
                }
                None => {}
            }
        }
        // right-private interleavings
        if kind.keeps_private_events() {
            for t in right.transitions.transitions_from(rq) {
                let event_name = right.event_name(t.event());
                if left.events.id(event_name).is_some() {
                    continue;
                }
                let e = result.events.id(event_name).expect("private event added");
                for &rp in t.targets() {
                    let target =
                        ensure_pair(lq, rp, &mut result, &mut queue, &mut pairs, &mut visited);
                    result.transitions.add(source, e, target);
                }
            }
        }
    }
    trace!(
        "{} of {} and {} has {} pair states",
        kind.tag(),
        left.name(),
        right.name(),
        result.states.len()
    );
    (result, pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn left() -> Automaton {
        Automaton::builder("L")
            .with_transitions([("1", "a", "2"), ("2", "b", "1")])
            .with_initial("1")
            .with_marked(["1"])
            .into_deterministic()
    }

    fn right() -> Automaton {
        Automaton::builder("R")
            .with_transitions([("x", "a", "y"), ("y", "c", "x")])
            .with_initial("x")
            .with_marked(["y"])
            .into_deterministic()
    }

    #[test]
    fn product_keeps_only_shared_events() {
        let p = left().product(&right());
        assert!(p.events().contains("a"));
        assert!(!p.events().contains("b"));
        assert!(!p.events().contains("c"));
        // (1,x) -a-> (2,y), then neither b nor c survives
        assert_eq!(p.states().len(), 2);
        assert_eq!(p.transitions().triple_count(), 1);
        assert!(p.contains_state("(1,x)"));
        assert!(p.contains_state("(2,y)"));
    }

    #[test]
    fn parallel_interleaves_private_events() {
        let p = left().parallel(&right());
        assert!(p.events().contains("b"));
        assert!(p.events().contains("c"));
        // from (2,y) both b (left-private) and c (right-private) proceed
        let q = p.states().id("(2,y)").unwrap();
        assert_eq!(p.transitions().transitions_from(q).len(), 2);
        assert_eq!(p.states().len(), 4);
    }

    #[test]
    fn combined_events_take_the_and_of_attributes() {
        let mut l = left();
        l.set_controllable("a", false);
        let p = l.product(&right());
        let a = p.events().id("a").unwrap();
        assert!(!p.events().get(a).unwrap().is_controllable());
        assert!(p.events().get(a).unwrap().is_observable());
    }

    #[test]
    fn union_marks_when_either_component_is_marked() {
        let u = left().union(&right());
        let both = u.states().id("(2,y)").unwrap();
        assert!(u.states().get(both).unwrap().is_marked());
        let only_left = u.states().id("(1,x)").unwrap();
        // 1 is marked in the left automaton, x is not marked in the right
        assert!(u.states().get(only_left).unwrap().is_marked());
        let par = left().parallel(&right());
        let p = par.states().id("(1,x)").unwrap();
        assert!(!par.states().get(p).unwrap().is_marked());
    }

    #[test]
    fn pair_states_record_their_composition() {
        let p = left().product(&right());
        let q = p.states().id("(2,y)").unwrap();
        assert_eq!(
            p.composition_of(q),
            OrderedSet::from(["2".to_string(), "y".to_string()])
        );
    }

    #[test]
    fn mixed_shapes_produce_a_nondeterministic_result() {
        let n = Automaton::builder("N")
            .with_transitions([("1", "a", "2"), ("1", "a", "3")])
            .with_initial("1")
            .into_nondeterministic();
        let p = n.parallel(&right());
        assert!(!p.is_deterministic());
    }
}
