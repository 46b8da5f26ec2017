//! Row mutations with their in-transaction hooks.

use crate::error::LifecycleResult;
use crate::model::ModelExt;
use crate::record::DomainRecord;
use crate::types::{FaultKind, Flow, Outcome};
use tracing::debug;

fn vetoed<T: DomainRecord>(entity: &mut T, message: Option<String>) -> Outcome {
    if let Some(message) = message {
        entity.core_mut().set_last_error(message);
    }
    Outcome::failure(FaultKind::Vetoed, entity.last_domain_error_or_default())
}

pub(crate) fn insert<T: DomainRecord>(entity: &mut T) -> LifecycleResult<Outcome> {
    if let Flow::Stop { message } = entity.before_save(true)? {
        return Ok(vetoed(entity, message));
    }

    let table = T::TABLE.name;
    let values = entity.record().core().attributes().clone();
    let generated = entity.record().db().store().insert(table, &values)?;

    let record = entity.record_mut();
    for (column, value) in generated {
        record.core_mut().set(column, value);
    }
    record.mark_persisted();
    debug!(table, "row inserted");

    entity.after_save(true)?;
    Ok(Outcome::success())
}

pub(crate) fn update<T: DomainRecord>(entity: &mut T) -> LifecycleResult<Outcome> {
    if let Flow::Stop { message } = entity.before_save(false)? {
        return Ok(vetoed(entity, message));
    }

    let table = T::TABLE.name;
    let dirty = entity.record().dirty_attributes();
    if dirty.is_empty() {
        debug!(table, "nothing to update");
    } else {
        let key = entity.record().primary_key(&T::TABLE, None)?;
        let affected = entity.record().db().store().update(table, &key, &dirty)?;
        entity.record_mut().mark_persisted();
        debug!(table, affected, columns = dirty.len(), "row updated");
    }

    entity.after_save(false)?;
    Ok(Outcome::success())
}

pub(crate) fn delete<T: DomainRecord>(entity: &mut T) -> LifecycleResult<Outcome> {
    if let Flow::Stop { message } = entity.before_delete()? {
        return Ok(vetoed(entity, message));
    }

    let table = T::TABLE.name;
    let key = entity.record().primary_key(&T::TABLE, None)?;
    let affected = entity.record().db().store().delete(table, &key)?;
    if affected == 0 {
        debug!(table, "row already gone");
        return Ok(Outcome::failure(
            FaultKind::NotApplied,
            entity.last_domain_error_or_default(),
        ));
    }
    entity.record_mut().mark_deleted();
    debug!(table, affected, "row deleted");

    entity.after_delete()?;
    Ok(Outcome::success())
}
