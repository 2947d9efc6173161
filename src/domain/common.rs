//! Shared traits for stored billing entities.

use uuid::Uuid;

/// Exposes a stable identifier for entities held by a store.
pub trait Identifiable {
    fn id(&self) -> Uuid;
}

/// Finds an entity by id in a slice of stored rows.
pub fn find_by_id<T: Identifiable>(rows: &[T], id: Uuid) -> Option<&T> {
    rows.iter().find(|row| row.id() == id)
}

/// Mutable variant of [`find_by_id`].
pub fn find_by_id_mut<T: Identifiable>(rows: &mut [T], id: Uuid) -> Option<&mut T> {
    rows.iter_mut().find(|row| row.id() == id)
}
