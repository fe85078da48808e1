//! The structural algorithms on automata: reachability pruning, cross-product
//! composition, observer (subset) construction and the supremal controllable
//! sublanguage. All of them build fresh automata and leave their inputs untouched,
//! with the single documented exception of [`Automaton::is_blocking`] which flags
//! non-coaccessible states `bad` as a side effect.
//!
//! [`Automaton::is_blocking`]: crate::automaton::Automaton::is_blocking

mod reachability;

mod compose;
pub use compose::Composition;
pub(crate) use compose::compose_with_pairs;

mod observer;
pub use observer::MarkingRule;

mod supcon;
pub use supcon::Disabled;
