//! List population
//!
//! The two list strategies. `SelfParent` scans the instance table for
//! children pointing back at the owning instance; `MultiParentList`
//! collects the non-null values of named sibling fields, first occurrence
//! wins on duplicates.

use indexmap::IndexSet;

use crate::error::{ResolveError, ResolveResult};
use crate::runtime::instance::InstanceId;
use crate::runtime::resolver::ResolveCtx;
use crate::runtime::value::Value;
use crate::runtime::Database;

/// All instances of `class_type` (or a subtype) whose parent back-reference
/// is `id`, in creation order. A live view: constructing a new child makes
/// it appear on the next access without any re-registration.
pub(crate) fn self_parent(
    db: &Database,
    id: InstanceId,
    class_type: &str,
) -> ResolveResult<Value> {
    let children = db.store().children_of(db.registry(), id, class_type);
    Ok(Value::List(children.into_iter().map(Value::Ref).collect()))
}

/// Non-null values of the named parent fields, declaration order, each
/// distinct parent once
pub(crate) fn multi_parent(
    ctx: &mut ResolveCtx<'_>,
    id: InstanceId,
    parents: &[String],
) -> ResolveResult<Value> {
    let mut seen: IndexSet<InstanceId> = IndexSet::new();
    for parent in parents {
        match ctx.get(id, parent)? {
            Value::Null => {}
            Value::Ref(target) => {
                seen.insert(target);
            }
            other => {
                let type_name = ctx
                    .instance_type(id)
                    .unwrap_or_else(|| id.to_string());
                return Err(ResolveError::ValueMismatch {
                    type_name,
                    field: parent.clone(),
                    message: format!("expected an entity reference, found {other:?}"),
                });
            }
        }
    }
    Ok(Value::List(seen.into_iter().map(Value::Ref).collect()))
}
