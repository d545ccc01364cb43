//! Generational slot map for session contexts.

use scan_types::ContextId;

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Arena of live contexts addressed by [`ContextId`].
///
/// Removing a context bumps its slot generation, so an ended id never
/// resolves again even after the slot is reused. Lookups are O(1).
#[derive(Debug, Clone)]
pub struct ContextRegistry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for ContextRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ContextRegistry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores `value` and returns its id.
    pub fn insert(&mut self, value: T) -> ContextId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                slot.value = Some(value);
                return ContextId::from_parts(index, slot.generation);
            }
        }
        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        ContextId::from_parts(index, 0)
    }

    fn slot(&self, id: ContextId) -> Option<&Slot<T>> {
        self.slots
            .get(id.index() as usize)
            .filter(|s| s.generation == id.generation())
    }

    /// Looks up a live context.
    #[must_use]
    pub fn get(&self, id: ContextId) -> Option<&T> {
        self.slot(id).and_then(|s| s.value.as_ref())
    }

    /// Looks up a live context mutably.
    pub fn get_mut(&mut self, id: ContextId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.value.as_mut())
    }

    /// Returns true if `id` refers to a live context.
    #[must_use]
    pub fn contains(&self, id: ContextId) -> bool {
        self.get(id).is_some()
    }

    /// Removes a context. The id is invalid afterwards.
    pub fn remove(&mut self, id: ContextId) -> Option<T> {
        let slot = self
            .slots
            .get_mut(id.index() as usize)
            .filter(|s| s.generation == id.generation())?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.len -= 1;
        Some(value)
    }

    /// Number of live contexts.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no context is live.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates live contexts.
    pub fn iter(&self) -> impl Iterator<Item = (ContextId, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            let index = u32::try_from(i).ok()?;
            s.value
                .as_ref()
                .map(|v| (ContextId::from_parts(index, s.generation), v))
        })
    }

    /// Ids of live contexts matching `pred`.
    pub fn find<F>(&self, mut pred: F) -> Vec<ContextId>
    where
        F: FnMut(&T) -> bool,
    {
        self.iter()
            .filter(|(_, v)| pred(v))
            .map(|(id, _)| id)
            .collect()
    }
}
