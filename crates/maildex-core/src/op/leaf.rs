use crate::{
    error::{ErrorOrigin, QueryError},
    index::{HitSourceBox, PrepareContext},
    obs::{EngineEvent, EngineSink},
    op::OpKind,
    predicate::{Folder, Predicate},
    target::QueryTarget,
};
use std::fmt;

///
/// LeafOperation
///
/// Evaluates one predicate against one target partition through the index
/// capability. Follows the same one-element lookahead discipline as the
/// combinators so every node in a tree iterates uniformly.
///

pub struct LeafOperation<H> {
    predicate: Predicate,
    target: QueryTarget,
    spam_trash_set: bool,
    source: Option<HitSourceBox<H>>,
    cached: Option<H>,
    at_start: bool,
    released: bool,
}

impl<H> LeafOperation<H> {
    #[must_use]
    pub fn new(target: QueryTarget, predicate: Predicate) -> Self {
        Self {
            predicate,
            target,
            spam_trash_set: false,
            source: None,
            cached: None,
            at_start: true,
            released: false,
        }
    }

    /// Reassemble a leaf from fused parts. Only valid before `prepare`.
    pub(super) fn from_parts(target: QueryTarget, predicate: Predicate, spam_trash_set: bool) -> Self {
        let mut leaf = Self::new(target, predicate);
        leaf.spam_trash_set = spam_trash_set;
        leaf
    }

    pub(super) fn into_parts(self) -> (QueryTarget, Predicate, bool) {
        debug_assert!(self.source.is_none(), "leaf fused after prepare");
        (self.target, self.predicate, self.spam_trash_set)
    }

    #[must_use]
    pub const fn target(&self) -> &QueryTarget {
        &self.target
    }

    #[must_use]
    pub const fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    #[must_use]
    pub const fn has_spam_trash_setting(&self) -> bool {
        self.spam_trash_set
    }

    /// Fence this leaf away from the spam/trash folders the caller did not
    /// opt into, by conjoining `ExcludeFolder` clauses onto the predicate.
    /// Must run before `prepare`.
    #[must_use]
    pub fn ensure_spam_trash_setting(mut self, include_junk: bool, include_trash: bool) -> Self {
        if self.spam_trash_set {
            return self;
        }
        if !include_junk {
            self.predicate = self.predicate.and(Predicate::ExcludeFolder(Folder::Junk));
        }
        if !include_trash {
            self.predicate = self.predicate.and(Predicate::ExcludeFolder(Folder::Trash));
        }
        self.spam_trash_set = true;
        self
    }

    /// Open the backend hit source and prime the first lookahead. A backend
    /// open failure propagates unchanged: an empty leaf is semantically
    /// different from a failed leaf.
    pub fn prepare(&mut self, ctx: &PrepareContext<'_, H>) -> Result<(), QueryError> {
        let mut source =
            ctx.index
                .open(&self.predicate, &self.target, ctx.sort, ctx.chunk_hint)?;
        self.cached = source.next_hit()?;
        self.source = Some(source);
        self.released = false;

        ctx.sink.record(EngineEvent::Prepared {
            kind: OpKind::Leaf,
            children: 0,
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
            // exhausted: the cache stays permanently empty
            return Ok(None);
        };
        if let Some(source) = self.source.as_mut() {
            self.cached = source.next_hit()?;
        }
        Ok(Some(hit))
    }

    pub fn reset_iterator(&mut self) -> Result<(), QueryError> {
        if self.at_start {
            return Ok(());
        }
        if let Some(source) = self.source.as_mut() {
            source.reset()?;
            self.cached = source.next_hit()?;
        }
        Ok(())
    }

    pub fn done_with_search_results(&mut self, sink: &dyn EngineSink) {
        if self.released {
            return;
        }
        self.released = true;
        self.cached = None;
        if let Some(mut source) = self.source.take() {
            if let Err(err) = source.close() {
                let err = QueryError::cleanup(ErrorOrigin::Operation, err.message);
                let message = err.display_with_class();
                sink.record(EngineEvent::CleanupFailed {
                    kind: OpKind::Leaf,
                    message: &message,
                });
            }
        }
    }
}

impl<H> fmt::Debug for LeafOperation<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafOperation")
            .field("target", &self.target)
            .field("predicate", &self.predicate)
            .field("spam_trash_set", &self.spam_trash_set)
            .field("primed", &self.cached.is_some())
            .field("at_start", &self.at_start)
            .finish_non_exhaustive()
    }
}
