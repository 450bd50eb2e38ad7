//! Generic handle table: maps the opaque `u32` IDs the VA API hands
//! consumers onto driver-owned objects, guarded by a single
//! driver-wide mutex per table (mirrors the teacher's
//! `SurfaceRingInner` pattern of one `Mutex`-protected store behind an
//! `Arc`, generalised from a fixed-size ring to an open-ended map).
//!
//! Object tables are deliberately separate from the per-session mutex in
//! `m2m::Session` / [`crate::context::Context`] — looking an object up
//! never requires holding that session's lock.

use std::collections::HashMap;
use std::sync::Mutex;

pub type Id = u32;

pub struct HandleTable<T> {
    next: Mutex<Id>,
    entries: Mutex<HashMap<Id, T>>,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        HandleTable {
            next: Mutex::new(1), // 0 is reserved as VA_INVALID_ID
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value`, returning its freshly allocated handle.
    pub fn insert(&self, value: T) -> Id {
        let mut next = self.next.lock().unwrap();
        let id = *next;
        *next += 1;
        self.entries.lock().unwrap().insert(id, value);
        id
    }

    pub fn remove(&self, id: Id) -> Option<T> {
        self.entries.lock().unwrap().remove(&id)
    }

    pub fn contains(&self, id: Id) -> bool {
        self.entries.lock().unwrap().contains_key(&id)
    }

    pub fn with<R>(&self, id: Id, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.entries.lock().unwrap().get(&id).map(f)
    }

    pub fn with_mut<R>(&self, id: Id, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.entries.lock().unwrap().get_mut(&id).map(f)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_and_increase() {
        let t: HandleTable<&'static str> = HandleTable::new();
        assert_eq!(t.insert("a"), 1);
        assert_eq!(t.insert("b"), 2);
    }

    #[test]
    fn remove_then_lookup_misses() {
        let t: HandleTable<i32> = HandleTable::new();
        let id = t.insert(42);
        assert!(t.contains(id));
        assert_eq!(t.remove(id), Some(42));
        assert!(!t.contains(id));
    }
}
