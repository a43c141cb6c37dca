//! Project State Projector: folds migrations into virtual schema snapshots.
//!
//! Every function returns fresh snapshots; a state handed to a data callback
//! is never touched by later folds.

use crate::migration::Migration;
use tern_core::{CoreResult, ProjectState};

/// Fold every operation of `migrations`, in order, over the empty state.
pub fn project<'a, I>(migrations: I) -> CoreResult<ProjectState>
where
    I: IntoIterator<Item = &'a Migration>,
{
    let mut state = ProjectState::new();
    for migration in migrations {
        advance(&mut state, migration)?;
    }
    Ok(state)
}

/// Fold all of `migration`'s operations into `state`.
///
/// On error `state` holds the operations folded before the failing one.
pub fn advance(state: &mut ProjectState, migration: &Migration) -> CoreResult<()> {
    for operation in &migration.operations {
        operation.state_forward(state, &migration.key)?;
    }
    Ok(())
}

/// The state after the first `count` operations of `migration`.
pub fn project_prefix(
    start: &ProjectState,
    migration: &Migration,
    count: usize,
) -> CoreResult<ProjectState> {
    let mut state = start.clone();
    for operation in migration.operations.iter().take(count) {
        operation.state_forward(&mut state, &migration.key)?;
    }
    Ok(state)
}

/// One snapshot per operation boundary of `migration`.
///
/// Element `i` is the state operation `i` sees; the last element is the state
/// after the whole migration, so the result has `operations.len() + 1`
/// entries.
pub fn snapshots(start: &ProjectState, migration: &Migration) -> CoreResult<Vec<ProjectState>> {
    let mut states = Vec::with_capacity(migration.operations.len() + 1);
    let mut state = start.clone();
    states.push(state.clone());
    for operation in &migration.operations {
        operation.state_forward(&mut state, &migration.key)?;
        states.push(state.clone());
    }
    Ok(states)
}

#[cfg(test)]
#[path = "projector_test.rs"]
mod tests;
