//! Re-interpreting a loaded row as another record type.

use crate::error::{ConfigFault, LifecycleResult};
use crate::record::{DomainRecord, Record};
use std::any::type_name;
use tracing::debug;

/// Clone-to for every [`DomainRecord`].
pub trait CloneTo: DomainRecord {
    /// Builds a `T` from this record's baseline snapshot.
    ///
    /// `T` must share this type's [`clone_base`](DomainRecord::clone_base)
    /// and table. The clone gets the baseline (not in-flight edits) and the
    /// lock flag, then [`after_clone_to`](DomainRecord::after_clone_to) runs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFault::CloneBaseMismatch`] or
    /// [`ConfigFault::CloneTableMismatch`].
    fn clone_to<T: DomainRecord>(&self) -> LifecycleResult<T> {
        self.clone_to_with(|_, _: &mut T| {})
    }

    /// Like [`clone_to`](CloneTo::clone_to), then runs `callback` on the
    /// clone.
    ///
    /// # Errors
    ///
    /// Same as [`clone_to`](CloneTo::clone_to).
    fn clone_to_with<T, F>(&self, callback: F) -> LifecycleResult<T>
    where
        T: DomainRecord,
        F: FnOnce(&Self, &mut T),
    {
        if T::clone_base() != Self::clone_base() {
            return Err(ConfigFault::CloneBaseMismatch {
                origin: type_name::<Self>(),
                target: type_name::<T>(),
            }
            .into());
        }
        if T::TABLE.name != Self::TABLE.name {
            return Err(ConfigFault::CloneTableMismatch {
                origin: type_name::<Self>(),
                origin_table: Self::TABLE.name,
                target: type_name::<T>(),
                target_table: T::TABLE.name,
            }
            .into());
        }

        let source = self.record();
        let mut record = Record::new(source.db());
        if let Some(old) = source.old_attributes() {
            record.populate(old.clone());
            record.set_already_locked_for_update(source.already_locked_for_update());
        }

        let mut target = T::from_record(record);
        self.after_clone_to(&mut target);
        callback(self, &mut target);
        debug!(
            origin = type_name::<Self>(),
            target = type_name::<T>(),
            table = Self::TABLE.name,
            "record cloned"
        );
        Ok(target)
    }
}

impl<T: DomainRecord> CloneTo for T {}
