use std::collections::VecDeque;

use bit_set::BitSet;
use tracing::{debug, trace};

use crate::automaton::Automaton;
use crate::error::Error;
use crate::math::{Map, Set};
use crate::modal::ModalSpec;
use crate::operations::{compose_with_pairs, Composition};
use crate::state::StateId;

impl ModalSpec {
    /// Synthesizes the maximally permissive deterministic controller for `plant`
    /// under this specification.
    ///
    /// The plant is first lifted to its universal observer view, so the controller
    /// only ever acts on what it can observe; the specification must therefore
    /// speak only in events the plant observes, anything else is rejected with
    /// [`Error::UnobservableSpecificationEvent`]. The product of observer view and
    /// specification is then cut down by a monotone bad-state fixed point combining
    /// three rules: a must-transition that the product cannot follow to a non-bad
    /// state marks the product state bad (must-violation); an observable
    /// uncontrollable plant event available at some composing plant state but not
    /// permitted by the product marks it bad (uncontrollable escape); and a product
    /// state from which no composing plant state can reach a marked state while
    /// staying off bad states is bad as well (dead end). States only ever move to
    /// bad, so the iteration terminates.
    ///
    /// Returns `Ok(None)` when the initial product state itself ends up bad, i.e.
    /// no compliant controller exists. That is a normal negative result.
    pub fn synthesize(&self, plant: &Automaton) -> Result<Option<Automaton>, Error> {
        for (_, event) in self.automaton.events.iter() {
            let unobservable = plant
                .events
                .id(event.name())
                .and_then(|e| plant.events.get(e))
                .is_some_and(|e| !e.is_observable());
            if unobservable {
                return Err(Error::UnobservableSpecificationEvent(
                    event.name().to_string(),
                ));
            }
        }

        let (universe, closure_of) = plant.universal_observer();
        let (product, pairs) =
            compose_with_pairs(&universe, &self.automaton, Composition::Product);
        if product.initial_states().is_empty() {
            return Ok(None);
        }

        let mut bad = BitSet::with_capacity(product.states.arena_len());
        loop {
            let mut changed = false;
            changed |= mark_must_violations(&product, self, &pairs, &mut bad);
            changed |= mark_uncontrollable_escapes(&product, plant, &universe, &pairs, &mut bad);
            changed |= mark_dead_ends(&product, &universe, &closure_of, &pairs, &mut bad);
            if !changed {
                break;
            }
        }
        debug!(
            "synthesis for {} against {} marked {} of {} product states bad",
            plant.name(),
            self.name(),
            bad.len(),
            product.states.len()
        );

        if product
            .initial_states()
            .iter()
            .any(|q| bad.contains(q.index()))
        {
            return Ok(None);
        }
        let excluded: Set<String> = product
            .states
            .iter()
            .filter(|(id, _)| bad.contains(id.index()))
            .map(|(_, s)| s.name().to_string())
            .collect();
        let mut supervisor = product
            .restrict(String::new(), &excluded)
            .accessible();
        supervisor.name = format!("sup({},{})", plant.name(), self.name());
        Ok(Some(supervisor))
    }
}

/// Marks product states whose specification component demands a must-transition
/// that the product cannot take towards a non-bad state.
fn mark_must_violations(
    product: &Automaton,
    spec: &ModalSpec,
    pairs: &Map<StateId, (StateId, StateId)>,
    bad: &mut BitSet,
) -> bool {
    let mut changed = false;
    for (p, _) in product.states.iter() {
        if bad.contains(p.index()) {
            continue;
        }
        let (_, s) = pairs[&p];
        for mt in spec.must.transitions_from(s) {
            let event_name = spec.automaton.events.name_of(mt.event());
            let followable = product
                .events
                .id(event_name)
                .and_then(|e| product.transitions.successors(p, e))
                .is_some_and(|targets| targets.iter().any(|t| !bad.contains(t.index())));
            if !followable {
                trace!(
                    "{} violates the must on {}",
                    product.state_name(p),
                    event_name
                );
                bad.insert(p.index());
                changed = true;
                break;
            }
        }
    }
    changed
}

/// Marks product states at which some composing plant state can take an observable
/// uncontrollable event that the product does not permit (towards a non-bad state).
fn mark_uncontrollable_escapes(
    product: &Automaton,
    plant: &Automaton,
    universe: &Automaton,
    pairs: &Map<StateId, (StateId, StateId)>,
    bad: &mut BitSet,
) -> bool {
    let mut changed = false;
    'states: for (p, _) in product.states.iter() {
        if bad.contains(p.index()) {
            continue;
        }
        let (u, _) = pairs[&p];
        for plant_state in universe.composition_of(u) {
            let Some(q) = plant.states.id(&plant_state) else {
                continue;
            };
            for t in plant.transitions.transitions_from(q) {
                let event = plant.events.get(t.event()).expect("live id");
                if !event.is_observable() || event.is_controllable() {
                    continue;
                }
                let permitted = product
                    .events
                    .id(event.name())
                    .and_then(|e| product.transitions.successors(p, e))
                    .is_some_and(|targets| targets.iter().any(|t| !bad.contains(t.index())));
                if !permitted {
                    trace!(
                        "{} cannot prevent uncontrollable {} from plant state {}",
                        product.state_name(p),
                        event.name(),
                        plant_state
                    );
                    bad.insert(p.index());
                    changed = true;
                    continue 'states;
                }
            }
        }
    }
    changed
}

/// Marks product states from which no composing plant state can still reach a
/// marked product state while avoiding bad states. The check re-products the
/// universal observer, rooted at the composing plant state's own closure
/// aggregate, against the current bad-aware product.
fn mark_dead_ends(
    product: &Automaton,
    universe: &Automaton,
    closure_of: &Map<String, String>,
    pairs: &Map<StateId, (StateId, StateId)>,
    bad: &mut BitSet,
) -> bool {
    let mut changed = false;
    for (p, _) in product.states.iter() {
        if bad.contains(p.index()) {
            continue;
        }
        let (u, _) = pairs[&p];
        let alive = universe.composition_of(u).iter().any(|plant_state| {
            closure_of
                .get(plant_state)
                .and_then(|aggregate| universe.states.id(aggregate))
                .is_some_and(|uq| marked_reachable(product, universe, uq, p, bad))
        });
        if !alive {
            trace!("{} is a dead end", product.state_name(p));
            bad.insert(p.index());
            changed = true;
        }
    }
    changed
}

/// Breadth-first search over pairs of (observer state, product state), stepping
/// synchronously on shared events and never entering a bad product state. Returns
/// whether a marked product state is reachable, the start included.
fn marked_reachable(
    product: &Automaton,
    universe: &Automaton,
    start_u: StateId,
    start_p: StateId,
    bad: &BitSet,
) -> bool {
    let mut seen: Set<(StateId, StateId)> = Set::default();
    seen.insert((start_u, start_p));
    let mut queue = VecDeque::from([(start_u, start_p)]);
    while let Some((uu, pp)) = queue.pop_front() {
        if product.states.get(pp).expect("live id").is_marked() {
            return true;
        }
        for t in product.transitions.transitions_from(pp) {
            let event_name = product.events.name_of(t.event());
            let Some(ue) = universe.events.id(event_name) else {
                continue;
            };
            let Some(u_targets) = universe.transitions.successors(uu, ue) else {
                continue;
            };
            for &pt in t.targets() {
                if bad.contains(pt.index()) {
                    continue;
                }
                for &ut in u_targets {
                    if seen.insert((ut, pt)) {
                        queue.push_back((ut, pt));
                    }
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::OrderedSet;

    /// 1 -a-> 2 -u-> 3 with u uncontrollable; 1 and 2 marked, everything observable.
    fn escape_plant(a_controllable: bool) -> Automaton {
        let mut plant = Automaton::builder("G")
            .with_transitions([("1", "a", "2"), ("2", "u", "3")])
            .with_initial("1")
            .with_marked(["1", "2"])
            .uncontrollable(["u"])
            .into_deterministic();
        if !a_controllable {
            plant.set_controllable("a", false);
        }
        plant
    }

    /// Allows only `a`, i.e. forbids the continuation on `u`.
    fn forbid_u_spec() -> ModalSpec {
        Automaton::builder("S")
            .with_transitions([("s0", "a", "s1")])
            .with_initial("s0")
            .with_marked(["s0", "s1"])
            .into_modal()
    }

    #[test]
    fn unobservable_specification_events_are_rejected() {
        let mut plant = escape_plant(true);
        plant.set_observable("a", false);
        assert!(matches!(
            forbid_u_spec().synthesize(&plant),
            Err(Error::UnobservableSpecificationEvent(e)) if e == "a"
        ));
    }

    #[test]
    fn supervisor_cuts_the_controllable_path_to_an_escape() {
        // entering 2 would expose the uncontrollable u the spec forbids, but a is
        // controllable, so the supervisor simply never takes it
        let plant = escape_plant(true);
        let sup = forbid_u_spec()
            .synthesize(&plant)
            .unwrap()
            .expect("a controller exists");
        assert_eq!(sup.states().len(), 1);
        assert!(sup.transitions().is_empty());
        assert!(sup.contains_state("({1},s0)"));
    }

    #[test]
    fn no_controller_exists_when_the_escape_is_uncontrollable() {
        // with a uncontrollable as well, the bad state propagates back to the start
        let plant = escape_plant(false);
        assert!(forbid_u_spec().synthesize(&plant).unwrap().is_none());
    }

    #[test]
    fn unsatisfiable_must_transitions_yield_no_controller() {
        let plant = escape_plant(true);
        let spec = Automaton::builder("S")
            .with_transitions([("s0", "a", "s1")])
            .with_must_transitions([("s0", "m", "s1")])
            .with_initial("s0")
            .with_marked(["s0", "s1"])
            .into_modal();
        // the plant has no m at all, the must can never be followed
        assert!(spec.synthesize(&plant).unwrap().is_none());
    }

    #[test_log::test]
    fn satisfied_must_transitions_survive() {
        let plant = Automaton::builder("G")
            .with_transitions([("1", "a", "2"), ("2", "b", "1")])
            .with_initial("1")
            .with_marked(["1", "2"])
            .into_deterministic();
        let spec = Automaton::builder("S")
            .with_transitions([("s0", "a", "s1"), ("s1", "b", "s0")])
            .with_must_transitions([("s0", "a", "s1")])
            .with_initial("s0")
            .with_marked(["s0", "s1"])
            .into_modal();
        let sup = spec
            .synthesize(&plant)
            .unwrap()
            .expect("a controller exists");
        assert_eq!(sup.states().len(), 2);
        assert_eq!(sup.transitions().triple_count(), 2);
    }

    #[test]
    fn dead_end_product_states_are_removed() {
        let plant = Automaton::builder("G")
            .with_transitions([("1", "a", "2")])
            .with_initial("1")
            .with_marked(["1"])
            .into_deterministic();
        let spec = Automaton::builder("S")
            .with_transitions([("s0", "a", "s1")])
            .with_initial("s0")
            .with_marked(["s0", "s1"])
            .into_modal();
        let sup = spec
            .synthesize(&plant)
            .unwrap()
            .expect("a controller exists");
        // ({2},s1) cannot reach any marked state and is cut, together with the
        // transition into it
        assert_eq!(sup.states().len(), 1);
        assert!(sup.transitions().is_empty());
    }

    #[test]
    fn supervisor_never_disables_observable_uncontrollable_plant_events() {
        let plant = Automaton::builder("G")
            .with_transitions([("1", "a", "2"), ("2", "u", "3"), ("3", "b", "1")])
            .with_initial("1")
            .with_marked(["1"])
            .uncontrollable(["u"])
            .into_deterministic();
        let spec = Automaton::builder("S")
            .with_transitions([
                ("s0", "a", "s1"),
                ("s1", "u", "s2"),
                ("s2", "b", "s0"),
            ])
            .with_initial("s0")
            .with_marked(["s0"])
            .into_modal();
        let sup = spec
            .synthesize(&plant)
            .unwrap()
            .expect("a controller exists");
        // wherever a surviving supervisor state contains plant state 2, the
        // uncontrollable u must still be enabled there
        let u_event = sup.events().id("u").unwrap();
        for (id, _) in sup.states().iter() {
            let contains_2 = sup
                .composition_of(id)
                .iter()
                .any(|name| name == "{2}");
            if contains_2 {
                assert!(
                    sup.transitions().successors(id, u_event).is_some(),
                    "u disabled at {}",
                    sup.states().name_of(id)
                );
            }
        }
    }

    #[test]
    fn synthesis_is_insensitive_to_construction_order() {
        let build = |transitions: Vec<(&str, &str, &str)>| {
            Automaton::builder("G")
                .with_transitions(transitions)
                .with_initial("1")
                .with_marked(["1"])
                .uncontrollable(["u"])
                .into_deterministic()
        };
        let spec = || {
            Automaton::builder("S")
                .with_transitions([("s0", "a", "s1"), ("s1", "b", "s0")])
                .with_initial("s0")
                .with_marked(["s0", "s1"])
                .into_modal()
        };
        let forward = build(vec![("1", "a", "2"), ("2", "b", "1"), ("2", "u", "3")]);
        let backward = build(vec![("2", "u", "3"), ("2", "b", "1"), ("1", "a", "2")]);
        let names = |sup: Automaton| -> OrderedSet<String> {
            sup.states()
                .iter()
                .map(|(_, s)| s.name().to_string())
                .collect()
        };
        let a = spec().synthesize(&forward).unwrap();
        let b = spec().synthesize(&backward).unwrap();
        match (a, b) {
            (Some(a), Some(b)) => assert_eq!(names(a), names(b)),
            (a, b) => assert_eq!(a.is_none(), b.is_none()),
        }
    }
}
