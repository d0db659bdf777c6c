//! Hook for settling deferred conflicts outside the merge.
//!
//! `merge` never calls a resolver. Callers that want to post-process the
//! conflicts left by the `defer` strategy (a review UI, a language model)
//! implement [`ConflictResolver`] and run it with [`apply_resolver`].

use super::{Conflict, MergeResult, Resolution};
use async_trait::async_trait;
use textmerge_core::AppResult;

#[async_trait]
pub trait ConflictResolver: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn resolve(&self, conflict: &Conflict) -> AppResult<Resolution>;

    /// Resolve several conflicts. The default resolves them one at a time.
    async fn resolve_batch(&self, conflicts: &[Conflict]) -> AppResult<Vec<Resolution>> {
        let mut resolutions = Vec::with_capacity(conflicts.len());
        for conflict in conflicts {
            resolutions.push(self.resolve(conflict).await?);
        }
        Ok(resolutions)
    }
}

/// Run `resolver` over the unresolved conflicts of `result` and splice each
/// resolution into the merged text. Returns the number of conflicts settled.
///
/// A resolution naming an unknown conflict id fails with
/// `AppError::ConflictNotFound`; resolutions before it stay applied.
pub async fn apply_resolver(
    result: &mut MergeResult,
    resolver: &dyn ConflictResolver,
) -> AppResult<usize> {
    if result.conflicts.is_empty() {
        return Ok(0);
    }

    let pending = result.conflicts.clone();
    let resolutions = resolver.resolve_batch(&pending).await?;
    let settled = resolutions.len();

    for resolution in resolutions {
        result.settle(resolution)?;
    }

    tracing::info!(
        "Resolver {} settled {} of {} conflicts",
        resolver.name(),
        settled,
        pending.len()
    );

    Ok(settled)
}
