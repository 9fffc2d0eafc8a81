//! The query operation tree.
//!
//! A caller builds a raw tree of Leaf/Union/Intersection nodes from a parsed
//! query, passes it once through [`QueryOperation::optimize`], prepares it
//! against a live index session, and pulls hits in global sort order through
//! the lookahead triple (`has_next`/`peek_next`/`get_next`). Every iterating
//! node keeps at most one primed hit; after any non-resetting call that
//! cached hit is the subtree's next hit in final sort order.

mod intersect;
mod leaf;
mod optimize;
mod sentinel;
#[cfg(test)]
mod tests;
mod union;

pub use intersect::IntersectionOperation;
pub use leaf::LeafOperation;
pub use sentinel::{AllResultOperation, NoResultOperation};
pub use union::UnionOperation;

use crate::{
    error::QueryError,
    hit::QueryHit,
    index::PrepareContext,
    obs::{EngineEvent, EngineSink},
    predicate::Predicate,
    target::{QueryTarget, QueryTargetSet},
};
use std::fmt;

///
/// OpKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpKind {
    Leaf,
    Union,
    Intersection,
    NoResult,
    AllResult,
}

impl OpKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Leaf => "leaf",
            Self::Union => "union",
            Self::Intersection => "intersection",
            Self::NoResult => "no_result",
            Self::AllResult => "all_result",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

///
/// QueryOperation
///
/// Closed node algebra of the execution tree. Nodes own their children
/// exclusively; node identity is not stable across optimization.
///

#[derive(Debug)]
pub enum QueryOperation<H> {
    Leaf(LeafOperation<H>),
    Union(UnionOperation<H>),
    Intersection(IntersectionOperation<H>),
    NoResult(NoResultOperation),
    AllResult(AllResultOperation),
}

impl<H> QueryOperation<H> {
    /// A leaf node over one predicate and one target partition.
    #[must_use]
    pub fn leaf(target: QueryTarget, predicate: Predicate) -> Self {
        Self::Leaf(LeafOperation::new(target, predicate))
    }

    /// A union ("OR") over the given children.
    #[must_use]
    pub fn union(children: Vec<Self>) -> Self {
        Self::Union(UnionOperation::with_children(children))
    }

    /// An intersection ("AND") over the given children.
    #[must_use]
    pub fn intersection(children: Vec<Self>) -> Self {
        Self::Intersection(IntersectionOperation::with_children(children))
    }

    #[must_use]
    pub const fn no_result() -> Self {
        Self::NoResult(NoResultOperation)
    }

    #[must_use]
    pub const fn all_result() -> Self {
        Self::AllResult(AllResultOperation)
    }

    #[must_use]
    pub const fn kind(&self) -> OpKind {
        match self {
            Self::Leaf(_) => OpKind::Leaf,
            Self::Union(_) => OpKind::Union,
            Self::Intersection(_) => OpKind::Intersection,
            Self::NoResult(_) => OpKind::NoResult,
            Self::AllResult(_) => OpKind::AllResult,
        }
    }

    /// True if this subtree statically produces no hits.
    #[must_use]
    pub const fn has_no_results(&self) -> bool {
        matches!(self, Self::NoResult(_))
    }

    /// True if this subtree statically matches everything. Callers receiving
    /// an `AllResult` root substitute a match-all leaf per target; the
    /// sentinel itself yields no hits.
    #[must_use]
    pub const fn has_all_results(&self) -> bool {
        matches!(self, Self::AllResult(_))
    }

    /// Union of all backing partitions this subtree reads from.
    #[must_use]
    pub fn get_query_targets(&self) -> QueryTargetSet {
        match self {
            Self::Leaf(leaf) => QueryTargetSet::singleton(leaf.target().clone()),
            Self::Union(union) => combined_targets(union.children()),
            Self::Intersection(intersection) => combined_targets(intersection.children()),
            Self::NoResult(_) | Self::AllResult(_) => QueryTargetSet::new(),
        }
    }

    /// Conjunctive capability flag: true only if every child already fences
    /// spam/trash folders. Sentinels report true (vacuously fenced).
    #[must_use]
    pub fn has_spam_trash_setting(&self) -> bool {
        match self {
            Self::Leaf(leaf) => leaf.has_spam_trash_setting(),
            Self::Union(union) => union.children().iter().all(Self::has_spam_trash_setting),
            Self::Intersection(intersection) => intersection
                .children()
                .iter()
                .all(Self::has_spam_trash_setting),
            Self::NoResult(_) | Self::AllResult(_) => true,
        }
    }

    /// Rewrite every child missing the spam/trash setting, preserving list
    /// order. Must run before `prepare`.
    #[must_use]
    pub fn ensure_spam_trash_setting(self, include_junk: bool, include_trash: bool) -> Self {
        match self {
            Self::Leaf(leaf) => {
                Self::Leaf(leaf.ensure_spam_trash_setting(include_junk, include_trash))
            }
            Self::Union(union) => {
                Self::Union(union.ensure_spam_trash_setting(include_junk, include_trash))
            }
            Self::Intersection(intersection) => Self::Intersection(
                intersection.ensure_spam_trash_setting(include_junk, include_trash),
            ),
            sentinel @ (Self::NoResult(_) | Self::AllResult(_)) => sentinel,
        }
    }

    /// Remove every part of this subtree that reads from a partition outside
    /// `allowed`. Leaves are removed outright (a top-level incompatible leaf
    /// rewrites itself to `NoResult`); nested combinators recurse before
    /// testing; a combinator emptied by pruning becomes `NoResult`.
    ///
    /// Returns the number of operations removed; a non-zero count is
    /// reported to the sink.
    pub fn prune_incompatible_targets(
        &mut self,
        allowed: &QueryTargetSet,
        sink: &dyn EngineSink,
    ) -> usize {
        let removed = self.prune_targets(allowed);
        if removed > 0 {
            sink.record(EngineEvent::TargetsPruned { removed });
        }
        removed
    }

    fn prune_targets(&mut self, allowed: &QueryTargetSet) -> usize {
        match self {
            Self::Leaf(leaf) => {
                if allowed.contains(leaf.target()) {
                    0
                } else {
                    *self = Self::no_result();
                    1
                }
            }
            Self::Union(union) => {
                let removed = prune_children(union.children_mut(), allowed);
                if union.children().is_empty() {
                    *self = Self::no_result();
                }
                removed
            }
            Self::Intersection(intersection) => {
                let removed = prune_children(intersection.children_mut(), allowed);
                if intersection.children().is_empty() {
                    *self = Self::no_result();
                }
                removed
            }
            Self::NoResult(_) | Self::AllResult(_) => 0,
        }
    }

    /// Release backend resources, children first, exactly once per source.
    /// Best-effort: failures are reported to the sink and never prevent
    /// sibling children from being released. Safe to call from any state,
    /// idempotent.
    pub fn done_with_search_results(&mut self, sink: &dyn EngineSink) {
        match self {
            Self::Leaf(leaf) => leaf.done_with_search_results(sink),
            Self::Union(union) => union.done_with_search_results(sink),
            Self::Intersection(intersection) => intersection.done_with_search_results(sink),
            Self::NoResult(_) | Self::AllResult(_) => {}
        }
    }
}

impl<H: QueryHit> QueryOperation<H> {
    /// Rewrite this tree into an equivalent, minimal-cost tree.
    ///
    /// Applied once per top-level tree, before `prepare`. The output is
    /// always `NoResult`, `AllResult`, a single leaf, or a minimal
    /// combinator whose direct children are pairwise non-fusable and not of
    /// the combinator's own kind.
    #[must_use]
    pub fn optimize(self) -> Self {
        optimize::optimize_op(self)
    }

    /// Open backend resources for the whole subtree and prime the first
    /// lookahead. Backend failures propagate unchanged; the tree is then in
    /// an undefined state and must be released and discarded.
    pub fn prepare(&mut self, ctx: &PrepareContext<'_, H>) -> Result<(), QueryError> {
        match self {
            Self::Leaf(leaf) => leaf.prepare(ctx),
            Self::Union(union) => union.prepare(ctx),
            Self::Intersection(intersection) => intersection.prepare(ctx),
            Self::NoResult(_) | Self::AllResult(_) => Ok(()),
        }
    }

    /// Cheap, side-effect-free: true while a primed lookahead hit exists.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.peek_next().is_some()
    }

    /// Borrow the primed lookahead hit without consuming it.
    #[must_use]
    pub fn peek_next(&self) -> Option<&H> {
        match self {
            Self::Leaf(leaf) => leaf.peek_next(),
            Self::Union(union) => union.peek_next(),
            Self::Intersection(intersection) => intersection.peek_next(),
            Self::NoResult(_) | Self::AllResult(_) => None,
        }
    }

    /// Consume and return the next hit in final sort order, re-priming the
    /// lookahead cache.
    pub fn get_next(&mut self) -> Result<Option<H>, QueryError> {
        match self {
            Self::Leaf(leaf) => leaf.get_next(),
            Self::Union(union) => union.get_next(),
            Self::Intersection(intersection) => intersection.get_next(),
            Self::NoResult(_) | Self::AllResult(_) => Ok(None),
        }
    }

    /// Rewind iteration to the first hit. No-op if iteration has not
    /// started; otherwise resets every child and re-primes.
    pub fn reset_iterator(&mut self) -> Result<(), QueryError> {
        match self {
            Self::Leaf(leaf) => leaf.reset_iterator(),
            Self::Union(union) => union.reset_iterator(),
            Self::Intersection(intersection) => intersection.reset_iterator(),
            Self::NoResult(_) | Self::AllResult(_) => Ok(()),
        }
    }
}

impl<H> fmt::Display for QueryOperation<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(leaf) => write!(f, "{}:{}", leaf.target(), leaf.predicate()),
            Self::Union(union) => display_children(f, union.children(), " OR "),
            Self::Intersection(intersection) => {
                display_children(f, intersection.children(), " AND ")
            }
            Self::NoResult(_) => write!(f, "NO_RESULTS"),
            Self::AllResult(_) => write!(f, "ALL_RESULTS"),
        }
    }
}

fn combined_targets<H>(children: &[QueryOperation<H>]) -> QueryTargetSet {
    let mut targets = QueryTargetSet::new();
    for child in children {
        targets.union_with(child.get_query_targets());
    }
    targets
}

fn display_children<H>(
    f: &mut fmt::Formatter<'_>,
    children: &[QueryOperation<H>],
    joiner: &str,
) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{joiner}")?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}

// Children pruned to NoResult are dropped in place; a nested combinator that
// was only partially pruned stays.
fn prune_children<H>(children: &mut Vec<QueryOperation<H>>, allowed: &QueryTargetSet) -> usize {
    let mut removed = 0;
    let mut i = children.len();
    while i > 0 {
        i -= 1;
        let n = children[i].prune_targets(allowed);
        removed += n;
        if n > 0 && children[i].has_no_results() {
            children.remove(i);
        }
    }
    removed
}
