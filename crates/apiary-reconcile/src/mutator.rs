//! Field mutator contract and composition
//!
//! A mutator compares `desired` against `existing` for a single concern and,
//! when they differ, copies that concern into `existing` and reports `true`.
//! A [`MutatorChain`] runs an ordered list of mutators and ORs the results,
//! producing the convergence function the engine applies to an object kind.

use std::fmt;

use crate::Result;

/// A boxed field mutator: `(desired, existing) -> changed`
pub type Mutator<K> = Box<dyn Fn(&K, &mut K) -> Result<bool> + Send + Sync>;

/// Ordered composition of field mutators for one object kind
///
/// Each mutator owns a disjoint set of fields, so ordering does not affect
/// the result; the conventional order only keeps logs stable.
pub struct MutatorChain<K> {
    mutators: Vec<(&'static str, Mutator<K>)>,
}

impl<K> Default for MutatorChain<K> {
    fn default() -> Self {
        Self {
            mutators: Vec::new(),
        }
    }
}

impl<K> fmt::Debug for MutatorChain<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.mutators.iter().map(|(name, _)| name))
            .finish()
    }
}

impl<K: 'static> MutatorChain<K> {
    /// Create an empty chain (reports no change)
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named mutator
    pub fn with<F>(mut self, name: &'static str, mutator: F) -> Self
    where
        F: Fn(&K, &mut K) -> Result<bool> + Send + Sync + 'static,
    {
        self.mutators.push((name, Box::new(mutator)));
        self
    }

    /// Append every mutator of another chain
    pub fn extend(mut self, other: MutatorChain<K>) -> Self {
        self.mutators.extend(other.mutators);
        self
    }

    /// Names of the mutators, in execution order
    pub fn names(&self) -> Vec<&'static str> {
        self.mutators.iter().map(|(name, _)| *name).collect()
    }

    /// Run every mutator, OR-ing their results
    ///
    /// Stops at the first error; `existing` may then hold partial changes and
    /// must not be written back.
    pub fn apply(&self, desired: &K, existing: &mut K) -> Result<bool> {
        let mut changed = false;
        for (name, mutator) in &self.mutators {
            let updated = mutator(desired, existing)?;
            if updated {
                tracing::trace!(mutator = %name, "mutator reported change");
            }
            changed |= updated;
        }
        Ok(changed)
    }

    /// Adapt the chain to the engine's `(existing, desired)` argument order
    pub fn into_mutate_fn(self) -> impl Fn(&mut K, &K) -> Result<bool> + Send + Sync {
        move |existing, desired| self.apply(desired, existing)
    }
}

/// Mutate function for objects that are only ever created, never updated
pub fn create_only<K>(_existing: &mut K, _desired: &K) -> Result<bool> {
    Ok(false)
}

/// Replace `existing` with `desired` if they differ
pub(crate) fn sync_value<T: PartialEq + Clone>(desired: &T, existing: &mut T) -> bool {
    if existing == desired {
        false
    } else {
        *existing = desired.clone();
        true
    }
}

/// Reconcile the element called `name` in a list keyed by name
///
/// Added when only desired has it, replaced when both have it and differ,
/// removed when only existing has it.
pub(crate) fn sync_named<T: PartialEq + Clone>(
    desired: &[T],
    existing: &mut Option<Vec<T>>,
    name: &str,
    key: impl Fn(&T) -> &str,
) -> bool {
    let want = desired.iter().find(|item| key(item) == name);
    let have = existing
        .as_deref()
        .and_then(|items| items.iter().position(|item| key(item) == name));

    match (want, have) {
        (None, None) => false,
        (Some(want), None) => {
            existing.get_or_insert_with(Vec::new).push(want.clone());
            true
        }
        (None, Some(idx)) => {
            if let Some(items) = existing.as_mut() {
                items.remove(idx);
            }
            true
        }
        (Some(want), Some(idx)) => match existing.as_mut() {
            Some(items) if items[idx] != *want => {
                items[idx] = want.clone();
                true
            }
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_common::Error;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Pair {
        a: i32,
        b: i32,
    }

    fn sync_a(desired: &Pair, existing: &mut Pair) -> Result<bool> {
        Ok(sync_value(&desired.a, &mut existing.a))
    }

    fn sync_b(desired: &Pair, existing: &mut Pair) -> Result<bool> {
        Ok(sync_value(&desired.b, &mut existing.b))
    }

    #[test]
    fn empty_chain_reports_no_change() {
        let chain = MutatorChain::<Pair>::new();
        let mut existing = Pair { a: 1, b: 2 };
        assert!(!chain.apply(&Pair::default(), &mut existing).unwrap());
        assert_eq!(existing, Pair { a: 1, b: 2 });
    }

    #[test]
    fn results_are_or_accumulated() {
        let chain = MutatorChain::new().with("a", sync_a).with("b", sync_b);
        let desired = Pair { a: 1, b: 2 };
        let mut existing = Pair { a: 1, b: 0 };

        assert!(chain.apply(&desired, &mut existing).unwrap());
        assert_eq!(existing, desired);
        assert!(!chain.apply(&desired, &mut existing).unwrap());
    }

    #[test]
    fn first_error_aborts_chain() {
        let chain = MutatorChain::new()
            .with("fail", |_: &Pair, _: &mut Pair| Err(Error::internal("boom")))
            .with("b", sync_b);
        let mut existing = Pair::default();
        let desired = Pair { a: 0, b: 7 };

        assert!(chain.apply(&desired, &mut existing).is_err());
        assert_eq!(existing.b, 0);
    }

    #[test]
    fn mutate_fn_swaps_argument_order() {
        let mutate = MutatorChain::new().with("a", sync_a).into_mutate_fn();
        let desired = Pair { a: 5, b: 0 };
        let mut existing = Pair::default();
        assert!(mutate(&mut existing, &desired).unwrap());
        assert_eq!(existing.a, 5);
    }

    #[test]
    fn names_preserve_order() {
        let chain = MutatorChain::new()
            .with("a", sync_a)
            .extend(MutatorChain::new().with("b", sync_b));
        assert_eq!(chain.names(), vec!["a", "b"]);
    }

    #[test]
    fn sync_named_adds_replaces_and_removes() {
        fn key(p: &(String, i32)) -> &str {
            &p.0
        }
        let desired = vec![("a".to_string(), 1)];

        let mut existing = None;
        assert!(sync_named(&desired, &mut existing, "a", key));
        assert_eq!(existing, Some(desired.clone()));

        let mut existing = Some(vec![("a".to_string(), 2), ("b".to_string(), 3)]);
        assert!(sync_named(&desired, &mut existing, "a", key));
        assert!(!sync_named(&desired, &mut existing, "a", key));
        assert!(sync_named(&desired, &mut existing, "b", key));
        assert_eq!(existing, Some(desired.clone()));
        assert!(!sync_named(&desired, &mut existing, "missing", key));
    }

    #[test]
    fn create_only_never_changes() {
        let mut existing = Pair { a: 1, b: 1 };
        assert!(!create_only(&mut existing, &Pair::default()).unwrap());
        assert_eq!(existing, Pair { a: 1, b: 1 });
    }
}
