//! Library for supervisory control of discrete-event systems in Rust.
//!
//! A discrete-event system is modeled as a finite automaton: a registry of named states, a
//! registry of named events and a transition function mapping each state to its outgoing
//! (event, targets) transitions. Events carry three independent attributes (controllable,
//! observable by the system, observable by an attacker) and states carry marked/private/bad
//! flags; these attributes are what the algorithms in this crate act on. A single
//! [`Automaton`] type covers both the deterministic and the nondeterministic case, told
//! apart by a [`Shape`] tag that decides whether adding a second target for the same
//! (state, event) overwrites or accumulates.
//!
//! On top of the data model the crate implements the classical supervisory-control
//! toolbox: accessibility, co-accessibility and trimming; product, parallel and union
//! composition; the observer (subset) construction with epsilon-closure over unobservable
//! events, including a universal variant seeded from every state at once; the supremal
//! controllable sublanguage of a plant with respect to a specification automaton; and an
//! opacity check over private states. [`ModalSpec`] adds a second, obligatory ("must")
//! transition function alongside the ordinary ("may") one and provides consistency
//! pruning, the greatest lower bound of two specifications and optimal supervisor
//! synthesis against a plant. Automata convert to and from a flat [`TransitionList`] for
//! external serializers and generators.
//!
//! Most operations build and return a fresh automaton rather than mutating in place; the
//! handful that flag states (such as [`Automaton::is_blocking`]) say so explicitly.
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The prelude is supposed to make using this package easier. Including everything, i.e.
/// `use supremal::prelude::*;` should be enough to use the package.
pub mod prelude {
    pub use super::{
        automaton::{Automaton, AutomatonBuilder},
        event::{Event, EventId, EventRegistry},
        export::TransitionList,
        math,
        modal::ModalSpec,
        operations::{Composition, Disabled, MarkingRule},
        state::{State, StateId, StateRegistry},
        transition::{Shape, Transition, TransitionFn},
        Error,
    };
}

/// This module contains some definitions of mathematical objects which are used throughout
/// the crate and do not really fit to the top level.
pub mod math;

mod error;
pub use error::Error;

/// States, their attributes and the name-indexed state registry.
pub mod state;

/// Events, their controllability/observability attributes and the event registry.
pub mod event;

/// Transition functions: the shape tag, per-state transition lists and epsilon-closure.
pub mod transition;

/// The automaton itself, together with its fluent builder.
pub mod automaton;
pub use automaton::{Automaton, AutomatonBuilder};

/// The algorithm toolbox: reachability, composition, the observer construction and the
/// supremal controllable sublanguage.
pub mod operations;

/// Modal specifications with may/must transition functions, pruning, greatest lower
/// bound and supervisor synthesis.
pub mod modal;
pub use modal::ModalSpec;

/// The opacity check over private states.
pub mod opacity;

/// Flattening automata to transition lists and rebuilding them.
pub mod export;
pub use export::TransitionList;

pub use transition::Shape;
