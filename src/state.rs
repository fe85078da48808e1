use crate::math::Map;

/// Index of a state within the [`StateRegistry`] of one automaton. Indices are arena
/// positions, they are stable for the lifetime of the registry and never reused, even
/// after the state they point to has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub(crate) usize);

impl StateId {
    /// Returns the raw arena position. Mainly useful for dense bookkeeping such as
    /// the bad-state bit set used during synthesis.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A state of an automaton. Identity is the name, which is unique within the registry
/// that owns the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    name: String,
    marked: bool,
    private: bool,
    bad: bool,
}

impl State {
    /// Creates a state with the given name and all attributes cleared.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            marked: false,
            private: false,
            bad: false,
        }
    }

    /// Consumes `self` and sets the marked attribute, builder style.
    pub fn with_marked(mut self, marked: bool) -> Self {
        self.marked = marked;
        self
    }

    /// Consumes `self` and sets the private attribute, builder style.
    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    /// The name identifying this state.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the state belongs to the accepted language.
    pub fn is_marked(&self) -> bool {
        self.marked
    }

    /// Whether the state is a secret, in the sense of opacity analysis.
    pub fn is_private(&self) -> bool {
        self.private
    }

    /// Whether the state has been flagged by a blocking check.
    pub fn is_bad(&self) -> bool {
        self.bad
    }

    /// Sets the marked attribute.
    pub fn set_marked(&mut self, marked: bool) {
        self.marked = marked;
    }

    /// Sets the private attribute.
    pub fn set_private(&mut self, private: bool) {
        self.private = private;
    }

    /// Sets the bad scratch flag.
    pub fn set_bad(&mut self, bad: bool) {
        self.bad = bad;
    }
}

/// A name-keyed interning store for the states of one automaton.
///
/// States live in an arena indexed by [`StateId`]; a removed state leaves a tombstone
/// behind so that the remaining indices stay valid. Registration is idempotent: adding
/// a template whose name is already present returns the canonical existing entry and
/// leaves the stored attributes untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateRegistry {
    slots: Vec<Option<State>>,
    index: Map<String, StateId>,
}

impl StateRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `template` to the registry. If a state with the same name already exists,
    /// its id is returned and the registry is not modified.
    pub fn add(&mut self, template: State) -> StateId {
        if let Some(&id) = self.index.get(template.name()) {
            return id;
        }
        let id = StateId(self.slots.len());
        self.index.insert(template.name().to_string(), id);
        self.slots.push(Some(template));
        id
    }

    /// Looks up the id of the state with the given name.
    pub fn id(&self, name: &str) -> Option<StateId> {
        self.index.get(name).copied()
    }

    /// Returns the state stored at `id`, if it is still present.
    pub fn get(&self, id: StateId) -> Option<&State> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Returns a mutable reference to the state stored at `id`.
    pub fn get_mut(&mut self, id: StateId) -> Option<&mut State> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Returns the name of the state at `id`. Panics if the state was removed, which
    /// would indicate a stale id leaking out of an algorithm.
    pub fn name_of(&self, id: StateId) -> &str {
        self.get(id).expect("stale state id").name()
    }

    /// Whether a state with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Removes the state at `id`, returning it. The slot becomes a tombstone; the id
    /// is not reused.
    pub fn remove(&mut self, id: StateId) -> Option<State> {
        let state = self.slots.get_mut(id.0).and_then(Option::take)?;
        self.index.remove(state.name());
        Some(state)
    }

    /// Iterates over all live states in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (StateId, &State)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (StateId(i), s)))
    }

    /// The number of live states.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the registry holds no live states.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The arena size, i.e. one past the largest id ever handed out. Removed states
    /// still count, which makes this suitable for sizing dense per-state bookkeeping.
    pub fn arena_len(&self) -> usize {
        self.slots.len()
    }
}
