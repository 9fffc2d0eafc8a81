//! One search, end to end: optimize the raw tree, prepare it against the
//! index, pull hits, release. The session is the engine's outward surface;
//! the request layer parses a query into a raw tree and hands it here.

use crate::{
    error::QueryError,
    hit::{QueryHit, SortKey},
    index::{IndexReader, PrepareContext},
    obs::{EngineEvent, EngineSink},
    op::QueryOperation,
};

///
/// SearchSession
///
/// Owns a prepared query tree and drives its iteration. Exactly one logical
/// caller pulls hits synchronously; backend resources are released exactly
/// once, on `close` or on drop.
///

pub struct SearchSession<'a, H> {
    root: QueryOperation<H>,
    sink: &'a dyn EngineSink,
    closed: bool,
}

impl<'a, H: QueryHit> SearchSession<'a, H> {
    /// Optimize `tree`, prepare it against `index`, and start iterating.
    ///
    /// On a prepare failure the partially-opened tree is released before the
    /// error propagates, so the caller never holds leaked backend sessions.
    pub fn start(
        tree: QueryOperation<H>,
        index: &'a dyn IndexReader<H>,
        sort: SortKey,
        chunk_hint: usize,
        sink: &'a dyn EngineSink,
    ) -> Result<Self, QueryError> {
        let before = tree.kind();
        let mut root = tree.optimize();
        sink.record(EngineEvent::TreeOptimized {
            before,
            after: root.kind(),
        });

        let ctx = PrepareContext::new(index, sort, chunk_hint, sink);
        if let Err(err) = root.prepare(&ctx) {
            root.done_with_search_results(sink);
            return Err(err);
        }

        Ok(Self {
            root,
            sink,
            closed: false,
        })
    }

    /// Pull the next hit in global sort order.
    pub fn next(&mut self) -> Result<Option<H>, QueryError> {
        if self.closed {
            return Err(QueryError::session_internal(
                "session used after close",
            ));
        }
        self.root.get_next()
    }

    #[must_use]
    pub fn peek(&self) -> Option<&H> {
        self.root.peek_next()
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.root.has_next()
    }

    /// Pull up to `n` hits. Shorter pages mean the tree is exhausted.
    pub fn fetch_page(&mut self, n: usize) -> Result<Vec<H>, QueryError> {
        let mut page = Vec::with_capacity(n.min(64));
        while page.len() < n {
            match self.next()? {
                Some(hit) => page.push(hit),
                None => break,
            }
        }
        Ok(page)
    }

    /// Rewind to the first hit.
    pub fn reset(&mut self) -> Result<(), QueryError> {
        self.root.reset_iterator()
    }

    /// The optimized tree, for diagnostics ("explain").
    #[must_use]
    pub const fn root(&self) -> &QueryOperation<H> {
        &self.root
    }

    /// Release backend resources. Idempotent, safe from any state.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.root.done_with_search_results(self.sink);
    }
}

impl<H> Drop for SearchSession<'_, H> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.root.done_with_search_results(self.sink);
        }
    }
}
