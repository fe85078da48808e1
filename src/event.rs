use crate::math::Map;

/// Index of an event within the [`EventRegistry`] of one automaton. Like state ids,
/// event ids are arena positions and remain stable across removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub(crate) usize);

impl EventId {
    /// Returns the raw arena position.
    pub fn index(self) -> usize {
        self.0
    }
}

/// An event of an automaton. Identity is the name; the three attribute booleans all
/// default to `true`.
///
/// `controllable` means a supervisor may prevent the event from occurring.
/// `observable` means the system (and thus the supervisor) can detect its occurrence;
/// unobservable events act as epsilon moves in every observer construction.
/// `attacker_observable` is the analogous attribute for the attacker of an opacity
/// analysis and is independent of the other two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    name: String,
    controllable: bool,
    observable: bool,
    attacker_observable: bool,
}

impl Event {
    /// Creates an event with the given name; all attributes default to `true`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            controllable: true,
            observable: true,
            attacker_observable: true,
        }
    }

    /// Consumes `self` and sets controllability, builder style.
    pub fn with_controllable(mut self, controllable: bool) -> Self {
        self.controllable = controllable;
        self
    }

    /// Consumes `self` and sets system observability, builder style.
    pub fn with_observable(mut self, observable: bool) -> Self {
        self.observable = observable;
        self
    }

    /// Consumes `self` and sets attacker observability, builder style.
    pub fn with_attacker_observable(mut self, attacker_observable: bool) -> Self {
        self.attacker_observable = attacker_observable;
        self
    }

    /// The name identifying this event.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a supervisor may disable this event.
    pub fn is_controllable(&self) -> bool {
        self.controllable
    }

    /// Whether the system observes occurrences of this event.
    pub fn is_observable(&self) -> bool {
        self.observable
    }

    /// Whether an attacker observes occurrences of this event.
    pub fn is_attacker_observable(&self) -> bool {
        self.attacker_observable
    }

    /// Sets controllability.
    pub fn set_controllable(&mut self, controllable: bool) {
        self.controllable = controllable;
    }

    /// Sets system observability.
    pub fn set_observable(&mut self, observable: bool) {
        self.observable = observable;
    }

    /// Sets attacker observability.
    pub fn set_attacker_observable(&mut self, attacker_observable: bool) {
        self.attacker_observable = attacker_observable;
    }

    /// Combines two occurrences of the same event, as needed by product and parallel
    /// composition: each attribute of the combined event is the logical AND of the
    /// two inputs. The name is taken from `self`; callers only ever combine events
    /// that share a name.
    pub fn combine(&self, other: &Event) -> Event {
        Event {
            name: self.name.clone(),
            controllable: self.controllable && other.controllable,
            observable: self.observable && other.observable,
            attacker_observable: self.attacker_observable && other.attacker_observable,
        }
    }
}

/// A name-keyed interning store for the events of one automaton, with the same arena
/// and idempotency semantics as [`StateRegistry`](crate::state::StateRegistry).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRegistry {
    slots: Vec<Option<Event>>,
    index: Map<String, EventId>,
}

impl EventRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `template` to the registry. If an event with the same name already exists,
    /// its id is returned and the registry is not modified.
    pub fn add(&mut self, template: Event) -> EventId {
        if let Some(&id) = self.index.get(template.name()) {
            return id;
        }
        let id = EventId(self.slots.len());
        self.index.insert(template.name().to_string(), id);
        self.slots.push(Some(template));
        id
    }

    /// Looks up the id of the event with the given name.
    pub fn id(&self, name: &str) -> Option<EventId> {
        self.index.get(name).copied()
    }

    /// Returns the event stored at `id`, if it is still present.
    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Returns a mutable reference to the event stored at `id`.
    pub fn get_mut(&mut self, id: EventId) -> Option<&mut Event> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Returns the name of the event at `id`. Panics on a stale id.
    pub fn name_of(&self, id: EventId) -> &str {
        self.get(id).expect("stale event id").name()
    }

    /// Whether an event with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Removes the event at `id`, returning it.
    pub fn remove(&mut self, id: EventId) -> Option<Event> {
        let event = self.slots.get_mut(id.0).and_then(Option::take)?;
        self.index.remove(event.name());
        Some(event)
    }

    /// Iterates over all live events in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (EventId, &Event)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|e| (EventId(i), e)))
    }

    /// The number of live events.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the registry holds no live events.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_default_to_true() {
        let e = Event::new("a");
        assert!(e.is_controllable() && e.is_observable() && e.is_attacker_observable());
    }

    #[test]
    fn combine_takes_the_and() {
        let a = Event::new("a").with_controllable(false);
        let b = Event::new("a").with_observable(false);
        let c = a.combine(&b);
        assert_eq!(c.name(), "a");
        assert!(!c.is_controllable());
        assert!(!c.is_observable());
        assert!(c.is_attacker_observable());
    }

    #[test]
    fn registration_is_idempotent() {
        let mut reg = EventRegistry::new();
        let a = reg.add(Event::new("a").with_controllable(false));
        let b = reg.add(Event::new("a"));
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
        assert!(!reg.get(a).unwrap().is_controllable());
    }
}
