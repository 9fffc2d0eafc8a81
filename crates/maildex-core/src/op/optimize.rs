//! The algebraic rewrite pass.
//!
//! Children are optimized first and come back in normal form, so a single
//! flattening sweep plus a local pairwise-fusion fixed point reaches the
//! global normal form without the restart-on-mutation scans the iteration
//! protocol would otherwise need.

use crate::{
    hit::QueryHit,
    op::{IntersectionOperation, LeafOperation, QueryOperation, UnionOperation},
};

///
/// CombineMode
///
/// Which algebra a pairwise fusion attempt runs under.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum CombineMode {
    Union,
    Intersection,
}

///
/// Combined
///
/// Outcome of a fusion attempt. Nodes are owned, so a failed attempt hands
/// both originals back for reinsertion.
///

pub(super) enum Combined<H> {
    Fused(QueryOperation<H>),
    Kept(QueryOperation<H>, QueryOperation<H>),
}

pub(super) fn optimize_op<H: QueryHit>(op: QueryOperation<H>) -> QueryOperation<H> {
    match op {
        QueryOperation::Union(union) => {
            optimize_combinator(union.into_children(), CombineMode::Union)
        }
        QueryOperation::Intersection(intersection) => {
            optimize_combinator(intersection.into_children(), CombineMode::Intersection)
        }
        other => other,
    }
}

fn optimize_combinator<H: QueryHit>(
    children: Vec<QueryOperation<H>>,
    mode: CombineMode,
) -> QueryOperation<H> {
    let optimized: Vec<_> = children.into_iter().map(optimize_op).collect();

    // associativity: promote same-kind children's children to this level,
    // preserving order within each promoted group
    let mut flat: Vec<QueryOperation<H>> = Vec::with_capacity(optimized.len());
    for child in optimized {
        match (mode, child) {
            (CombineMode::Union, QueryOperation::Union(inner)) => {
                flat.extend(inner.into_children());
            }
            (CombineMode::Intersection, QueryOperation::Intersection(inner)) => {
                flat.extend(inner.into_children());
            }
            (_, other) => flat.push(other),
        }
    }

    if flat.is_empty() {
        return QueryOperation::no_result();
    }

    // pairwise fusion to fixed point, index-ascending, lhs rules
    // authoritative; the first success restarts the scan because fusion
    // changes list membership
    'scan: loop {
        for i in 0..flat.len() {
            for j in (i + 1)..flat.len() {
                let rhs = flat.remove(j);
                let lhs = flat.remove(i);
                match combine(lhs, rhs, mode) {
                    Combined::Fused(node) => {
                        flat.push(node);
                        continue 'scan;
                    }
                    Combined::Kept(lhs, rhs) => {
                        flat.insert(i, lhs);
                        flat.insert(j, rhs);
                    }
                }
            }
        }
        break;
    }

    // no wrapper overhead survives optimization
    if flat.len() == 1 {
        if let Some(only) = flat.pop() {
            return only;
        }
    }

    match mode {
        CombineMode::Union => QueryOperation::Union(UnionOperation::with_children(flat)),
        CombineMode::Intersection => {
            QueryOperation::Intersection(IntersectionOperation::with_children(flat))
        }
    }
}

/// Attempt to fuse two sibling nodes into one. Sentinels obey the usual
/// identity/absorber laws; same-target leaves fuse their predicates under
/// the surrounding algebra.
pub(super) fn combine<H: QueryHit>(
    lhs: QueryOperation<H>,
    rhs: QueryOperation<H>,
    mode: CombineMode,
) -> Combined<H> {
    use QueryOperation as Op;

    match mode {
        CombineMode::Union => match (lhs, rhs) {
            // NoResult is the union identity
            (Op::NoResult(_), other) | (other, Op::NoResult(_)) => Combined::Fused(other),
            // AllResult absorbs the union
            (Op::AllResult(all), _) | (_, Op::AllResult(all)) => {
                Combined::Fused(Op::AllResult(all))
            }
            (Op::Leaf(lhs), Op::Leaf(rhs)) => fuse_leaves(lhs, rhs, mode),
            (lhs, rhs) => Combined::Kept(lhs, rhs),
        },
        CombineMode::Intersection => match (lhs, rhs) {
            // AllResult is the intersection identity
            (Op::AllResult(_), other) | (other, Op::AllResult(_)) => Combined::Fused(other),
            // NoResult annihilates the intersection
            (Op::NoResult(none), _) | (_, Op::NoResult(none)) => {
                Combined::Fused(Op::NoResult(none))
            }
            (Op::Leaf(lhs), Op::Leaf(rhs)) => fuse_leaves(lhs, rhs, mode),
            (lhs, rhs) => Combined::Kept(lhs, rhs),
        },
    }
}

/// Two leaves against the same target partition collapse into one leaf with
/// a composed predicate, but only when their spam/trash flags agree. Fusing
/// across that boundary would silently widen or narrow one side's folder
/// fence.
fn fuse_leaves<H: QueryHit>(
    lhs: LeafOperation<H>,
    rhs: LeafOperation<H>,
    mode: CombineMode,
) -> Combined<H> {
    if lhs.target() != rhs.target()
        || lhs.has_spam_trash_setting() != rhs.has_spam_trash_setting()
    {
        return Combined::Kept(QueryOperation::Leaf(lhs), QueryOperation::Leaf(rhs));
    }

    let (target, lhs_predicate, spam_trash_set) = lhs.into_parts();
    let (_, rhs_predicate, _) = rhs.into_parts();
    let predicate = match mode {
        CombineMode::Union => lhs_predicate.or(rhs_predicate),
        CombineMode::Intersection => lhs_predicate.and(rhs_predicate),
    };

    Combined::Fused(QueryOperation::Leaf(LeafOperation::from_parts(
        target,
        predicate,
        spam_trash_set,
    )))
}
