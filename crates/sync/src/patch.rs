//! Partial-update primitive shared by every persisted entity.
//!
//! Applying a patch is split into a pure decision ([`Reconcile::should_update`])
//! and three phases that only run when the decision is positive:
//!
//! 1. [`will_update`](Reconcile::will_update): prepare, e.g. remove output
//!    that is about to become stale.
//! 2. [`update`](Reconcile::update): merge the patch into in-memory state.
//! 3. [`did_update`](Reconcile::did_update): materialize the new state.
//!
//! When the decision is negative the patch is still merged, but no side
//! effects run.

use async_trait::async_trait;

use crate::error::Result;

/// A proposed partial update to some entity.
pub trait Patch {
    /// Whether the patch would change nothing at all.
    fn is_empty(&self) -> bool;
}

/// An entity that can take a [`Patch`] through the three update phases.
#[async_trait]
pub trait Reconcile: Send {
    type Patch: Patch + Send + Sync;

    /// Decide whether `patch` warrants side effects. Must not touch disk or
    /// network. Defaults to "any non-empty patch".
    fn should_update(&self, patch: &Self::Patch) -> bool {
        !patch.is_empty()
    }

    async fn will_update(&mut self, _patch: &Self::Patch) -> Result<()> {
        Ok(())
    }

    /// Merge the patch into in-memory state.
    fn update(&mut self, patch: Self::Patch);

    async fn did_update(&mut self) -> Result<()> {
        Ok(())
    }
}

/// What [`apply`] did with a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Merged (or discarded, if empty) without side effects.
    Unchanged,
    /// All three phases ran.
    Updated,
}

/// Drive `target` through the update phases for `patch`.
///
/// An error in [`will_update`](Reconcile::will_update) leaves the patch
/// unmerged; an error in [`did_update`](Reconcile::did_update) leaves it
/// merged. Either way the error is returned as-is.
pub async fn apply<R>(target: &mut R, patch: R::Patch) -> Result<Outcome>
where
    R: Reconcile + ?Sized,
{
    if patch.is_empty() {
        return Ok(Outcome::Unchanged);
    }
    if !target.should_update(&patch) {
        target.update(patch);
        return Ok(Outcome::Unchanged);
    }
    target.will_update(&patch).await?;
    target.update(patch);
    target.did_update().await?;
    Ok(Outcome::Updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[derive(Default)]
    struct Counter {
        value: u32,
        label: Option<String>,
        phases: Vec<&'static str>,
        fail_after_merge: bool,
    }

    #[derive(Default)]
    struct CounterPatch {
        value: Option<u32>,
        label: Option<String>,
    }

    impl Patch for CounterPatch {
        fn is_empty(&self) -> bool {
            self.value.is_none() && self.label.is_none()
        }
    }

    #[async_trait]
    impl Reconcile for Counter {
        type Patch = CounterPatch;

        // Only a value change matters; labels are bookkeeping.
        fn should_update(&self, patch: &CounterPatch) -> bool {
            patch.value.is_some_and(|v| v != self.value)
        }

        async fn will_update(&mut self, _patch: &CounterPatch) -> Result<()> {
            self.phases.push("will");
            Ok(())
        }

        fn update(&mut self, patch: CounterPatch) {
            self.phases.push("update");
            if let Some(value) = patch.value {
                self.value = value;
            }
            if let Some(label) = patch.label {
                self.label = Some(label);
            }
        }

        async fn did_update(&mut self) -> Result<()> {
            self.phases.push("did");
            if self.fail_after_merge {
                exn::bail!(ErrorKind::Storage);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_phases_run_in_order() {
        let mut counter = Counter::default();
        let outcome = apply(&mut counter, CounterPatch { value: Some(3), label: None }).await.unwrap();
        assert_eq!(outcome, Outcome::Updated);
        assert_eq!(counter.value, 3);
        assert_eq!(counter.phases, ["will", "update", "did"]);
    }

    #[tokio::test]
    async fn test_negative_decision_merges_without_side_effects() {
        let mut counter = Counter::default();
        let patch = CounterPatch { value: None, label: Some("x".into()) };
        let outcome = apply(&mut counter, patch).await.unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(counter.label.as_deref(), Some("x"));
        assert_eq!(counter.phases, ["update"]);
    }

    #[tokio::test]
    async fn test_empty_patch_is_skipped_entirely() {
        let mut counter = Counter::default();
        let outcome = apply(&mut counter, CounterPatch::default()).await.unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert!(counter.phases.is_empty());
    }

    #[tokio::test]
    async fn test_error_after_merge_keeps_merged_state() {
        let mut counter = Counter { fail_after_merge: true, ..Default::default() };
        let err = apply(&mut counter, CounterPatch { value: Some(9), label: None }).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Storage));
        assert_eq!(counter.value, 9);
    }
}
