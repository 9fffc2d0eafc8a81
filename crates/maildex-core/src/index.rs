//! The index capability: the single seam between the engine and whatever
//! produces hits (full-text index scan, LDAP search, structured filter).
//! The engine only assumes "given a leaf predicate and a target partition,
//! produce a lazy sequence of hits already sorted by the requested sort key".

use crate::{
    error::QueryError,
    hit::SortKey,
    obs::EngineSink,
    predicate::Predicate,
    target::QueryTarget,
};

///
/// HitSource
///
/// Pull-based contract for one opened, already-sorted hit sequence.
///

pub trait HitSource<H> {
    /// Pull the next hit, or `None` once the sequence is exhausted.
    fn next_hit(&mut self) -> Result<Option<H>, QueryError>;

    /// Rewind to the start of the sequence.
    fn reset(&mut self) -> Result<(), QueryError>;

    /// Release backend resources. Called at most once.
    fn close(&mut self) -> Result<(), QueryError>;
}

pub type HitSourceBox<H> = Box<dyn HitSource<H>>;

impl<H, T> HitSource<H> for Box<T>
where
    T: HitSource<H> + ?Sized,
{
    fn next_hit(&mut self) -> Result<Option<H>, QueryError> {
        self.as_mut().next_hit()
    }

    fn reset(&mut self) -> Result<(), QueryError> {
        self.as_mut().reset()
    }

    fn close(&mut self) -> Result<(), QueryError> {
        self.as_mut().close()
    }
}

///
/// IndexReader
///
/// Factory for hit sources. Open failures propagate unchanged out of the
/// leaf's `prepare`: an empty leaf is semantically different from a failed
/// leaf, so the engine never degrades a failure to an empty result.
///

pub trait IndexReader<H> {
    fn open(
        &self,
        predicate: &Predicate,
        target: &QueryTarget,
        sort: SortKey,
        chunk_hint: usize,
    ) -> Result<HitSourceBox<H>, QueryError>;
}

///
/// PrepareContext
///
/// Everything a node needs to open its backend resources: the index
/// capability, the tree's sort key, the advisory chunk hint, and the
/// observability sink.
///

pub struct PrepareContext<'a, H> {
    pub index: &'a dyn IndexReader<H>,
    pub sort: SortKey,
    pub chunk_hint: usize,
    pub sink: &'a dyn EngineSink,
}

impl<'a, H> PrepareContext<'a, H> {
    #[must_use]
    pub fn new(
        index: &'a dyn IndexReader<H>,
        sort: SortKey,
        chunk_hint: usize,
        sink: &'a dyn EngineSink,
    ) -> Self {
        Self {
            index,
            sort,
            chunk_hint,
            sink,
        }
    }

    /// Context handed to a combinator's children: the chunk hint grows by
    /// one because the combinator buffers one lookahead hit per child.
    #[must_use]
    pub fn buffered(&self) -> Self {
        Self {
            index: self.index,
            sort: self.sort,
            chunk_hint: self.chunk_hint.saturating_add(1),
            sink: self.sink,
        }
    }
}

impl<H> Clone for PrepareContext<'_, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H> Copy for PrepareContext<'_, H> {}
