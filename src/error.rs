use thiserror::Error;

/// The ways in which an analysis or synthesis call can reject its input.
///
/// Note that a specification which prunes away entirely, or a synthesis for which no
/// compliant controller exists, is *not* an error. Those are ordinary negative results
/// and are reported as `None`. Likewise, looking up a state or event that does not
/// exist yields `None` from the respective query, never an `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A modal specification talks about an event which the plant cannot observe.
    /// Supervision happens through the observer view of the plant, so a specification
    /// is required to speak only in observable terms.
    #[error("specification event `{0}` is unobservable in the plant")]
    UnobservableSpecificationEvent(String),

    /// A modal operation was handed a nondeterministic automaton. How the modal
    /// product should treat multiple initial states is deliberately left unresolved,
    /// so the input is rejected instead of silently picking a tie-break.
    #[error("modal operations on nondeterministic automata are unsupported")]
    NondeterministicSpecification,
}
