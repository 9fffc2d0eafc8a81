use crate::{
    error::QueryError,
    hit::{QueryHit, SortKey},
    index::PrepareContext,
    obs::{EngineEvent, EngineSink},
    op::{OpKind, QueryOperation},
};
use std::cmp::Ordering;

///
/// IntersectionOperation
///
/// k-way lazy merge-join of child streams requiring agreement ("AND").
///
/// The join test is sort-key comparator equality, not full hit identity:
/// two distinct hits that compare `Equal` under the tree's sort key are
/// treated as the same hit and collapsed into one emission. Backends that
/// need identity joins must provide a sort key that is unique per hit
/// (tie-broken, e.g. by item id).
///

#[derive(Debug)]
pub struct IntersectionOperation<H> {
    children: Vec<QueryOperation<H>>,
    cached: Option<H>,
    sort: SortKey,
    at_start: bool,
}

impl<H> Default for IntersectionOperation<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> IntersectionOperation<H> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            children: Vec::new(),
            cached: None,
            sort: SortKey::DateDesc,
            at_start: true,
        }
    }

    #[must_use]
    pub fn with_children(children: Vec<QueryOperation<H>>) -> Self {
        let mut intersection = Self::new();
        intersection.children = children;
        intersection
    }

    pub fn add(&mut self, child: QueryOperation<H>) {
        self.children.push(child);
    }

    #[must_use]
    pub fn children(&self) -> &[QueryOperation<H>] {
        &self.children
    }

    pub(super) const fn children_mut(&mut self) -> &mut Vec<QueryOperation<H>> {
        &mut self.children
    }

    pub(super) fn into_children(self) -> Vec<QueryOperation<H>> {
        self.children
    }

    /// Rewrite every child missing the spam/trash setting, preserving list
    /// order. The child count never changes.
    #[must_use]
    pub fn ensure_spam_trash_setting(mut self, include_junk: bool, include_trash: bool) -> Self {
        let before = self.children.len();
        self.children = self
            .children
            .into_iter()
            .map(|child| {
                if child.has_spam_trash_setting() {
                    child
                } else {
                    child.ensure_spam_trash_setting(include_junk, include_trash)
                }
            })
            .collect();
        debug_assert_eq!(self.children.len(), before, "spam/trash rewrite dropped a child");
        self
    }

    /// Forwarded to every child, always: one child failing to release never
    /// prevents its siblings from being released.
    pub fn done_with_search_results(&mut self, sink: &dyn EngineSink) {
        self.cached = None;
        for child in &mut self.children {
            child.done_with_search_results(sink);
        }
    }
}

impl<H: QueryHit> IntersectionOperation<H> {
    pub fn prepare(&mut self, ctx: &PrepareContext<'_, H>) -> Result<(), QueryError> {
        self.sort = ctx.sort;

        let child_ctx = ctx.buffered();
        for child in &mut self.children {
            child.prepare(&child_ctx)?;
        }
        self.prime()?;

        ctx.sink.record(EngineEvent::Prepared {
            kind: OpKind::Intersection,
            children: self.children.len(),
        });

        Ok(())
    }

    #[must_use]
    pub const fn peek_next(&self) -> Option<&H> {
        self.cached.as_ref()
    }

    pub fn get_next(&mut self) -> Result<Option<H>, QueryError> {
        self.at_start = false;
        let Some(hit) = self.cached.take() else {
            return Ok(None);
        };
        self.prime()?;
        Ok(Some(hit))
    }

    pub fn reset_iterator(&mut self) -> Result<(), QueryError> {
        if self.at_start {
            return Ok(());
        }
        for child in &mut self.children {
            child.reset_iterator()?;
        }
        self.cached = None;
        self.prime()
    }

    /// Sorted merge-join. While the children's lookahead hits are not all
    /// equal under the sort comparator, advance exactly the children holding
    /// the minimum. Once all agree, that hit is the next intersection hit:
    /// it is pulled from the first child and the remaining children advance
    /// past their matching copy.
    fn prime(&mut self) -> Result<(), QueryError> {
        if self.cached.is_some() || self.children.is_empty() {
            return Ok(());
        }

        loop {
            // any exhausted child ends the whole intersection
            if self.children.iter().any(|child| !child.has_next()) {
                return Ok(());
            }

            let min_positions = self.minimum_positions();
            if min_positions.len() == self.children.len() {
                let hit = self.children[0].get_next()?;
                debug_assert!(hit.is_some(), "agreeing child produced no hit");
                for child in self.children.iter_mut().skip(1) {
                    let _ = child.get_next()?;
                }
                self.cached = hit;
                return Ok(());
            }

            // every minimum child holds a primed hit, so each advance
            // consumes one hit and the loop makes progress
            for &i in &min_positions {
                let _ = self.children[i].get_next()?;
            }
        }
    }

    /// Indices of the children whose lookahead hit is the minimum under the
    /// sort comparator. Every child is known to have a lookahead here.
    fn minimum_positions(&self) -> Vec<usize> {
        let mut min_positions: Vec<usize> = Vec::with_capacity(self.children.len());
        for (i, child) in self.children.iter().enumerate() {
            let Some(peek) = child.peek_next() else {
                continue;
            };
            let Some(&first) = min_positions.first() else {
                min_positions.push(i);
                continue;
            };
            let Some(min_peek) = self.children[first].peek_next() else {
                continue;
            };
            match peek.compare(self.sort, min_peek) {
                Ordering::Less => {
                    min_positions.clear();
                    min_positions.push(i);
                }
                Ordering::Equal => min_positions.push(i),
                Ordering::Greater => {}
            }
        }
        min_positions
    }
}
