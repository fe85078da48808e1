use std::collections::{BTreeMap, BTreeSet};

/// Type alias for sets, we use this to hide which type of `HashSet` we are actually using.
pub type Set<S> = fxhash::FxHashSet<S>;
/// Type alias for maps, we use this to hide which type of `HashMap` we are actually using.
pub type Map<K, V> = fxhash::FxHashMap<K, V>;

/// Type alias for sets with a deterministic iteration order. Used wherever the result of an
/// algorithm must not depend on hash iteration order, e.g. the target sets of transitions and
/// the compositions recorded by the observer construction.
pub type OrderedSet<S> = BTreeSet<S>;
/// Type alias for maps with a deterministic iteration order.
pub type OrderedMap<K, V> = BTreeMap<K, V>;
