use derive_more::{Deref, DerefMut, Display, IntoIterator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

///
/// QueryTarget
///
/// Identifier of one backing index partition (one mailbox shard in the
/// groupware deployment). Leaf operations read from exactly one target.
///

#[derive(
    Clone, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[display("{_0}")]
pub struct QueryTarget(String);

impl QueryTarget {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QueryTarget {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

///
/// QueryTargetSet
///
/// The set of partitions a subtree reads from, closed under union.
/// A leaf's set has exactly one element; a combinator's set is the union of
/// its children's.
///

#[derive(Clone, Debug, Default, Deref, DerefMut, Eq, IntoIterator, PartialEq)]
pub struct QueryTargetSet(BTreeSet<QueryTarget>);

impl QueryTargetSet {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    #[must_use]
    pub fn singleton(target: QueryTarget) -> Self {
        let mut set = Self::new();
        set.0.insert(target);
        set
    }

    /// Union in place with another target set.
    pub fn union_with(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }
}

impl FromIterator<QueryTarget> for QueryTargetSet {
    fn from_iter<I: IntoIterator<Item = QueryTarget>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
