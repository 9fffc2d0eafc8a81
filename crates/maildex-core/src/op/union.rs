use crate::{
    error::QueryError,
    hit::{QueryHit, SortKey},
    index::PrepareContext,
    obs::{EngineEvent, EngineSink},
    op::{OpKind, QueryOperation},
};
use std::cmp::Ordering;

///
/// UnionOperation
///
/// k-way lazy merge of child streams in sort order ("OR"). Duplicates are
/// preserved: a hit produced by two children is emitted twice.
///

#[derive(Debug)]
pub struct UnionOperation<H> {
    children: Vec<QueryOperation<H>>,
    cached: Option<H>,
    sort: SortKey,
    at_start: bool,
}

impl<H> Default for UnionOperation<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> UnionOperation<H> {
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
        let mut union = Self::new();
        union.children = children;
        union
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

impl<H: QueryHit> UnionOperation<H> {
    pub fn prepare(&mut self, ctx: &PrepareContext<'_, H>) -> Result<(), QueryError> {
        self.sort = ctx.sort;

        // children get a chunk hint one larger: this node buffers one
        // lookahead hit per child
        let child_ctx = ctx.buffered();
        for child in &mut self.children {
            child.prepare(&child_ctx)?;
        }
        self.prime()?;

        ctx.sink.record(EngineEvent::Prepared {
            kind: OpKind::Union,
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
            // exhausted: don't rescan children once the merge has drained
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

    /// Scan all children for the sort-earliest lookahead hit and pull
    /// exactly one hit from that single best child. Ties go to the first
    /// child in list order, which keeps the merge stable and deterministic.
    /// O(children) per produced hit.
    fn prime(&mut self) -> Result<(), QueryError> {
        if self.cached.is_some() {
            return Ok(());
        }

        let mut best: Option<usize> = None;
        for (i, child) in self.children.iter().enumerate() {
            let Some(peek) = child.peek_next() else {
                continue;
            };
            match best {
                None => best = Some(i),
                Some(b) => {
                    if let Some(best_peek) = self.children[b].peek_next() {
                        if peek.compare(self.sort, best_peek) == Ordering::Less {
                            best = Some(i);
                        }
                    }
                }
            }
        }

        if let Some(i) = best {
            self.cached = self.children[i].get_next()?;
        }
        Ok(())
    }
}
