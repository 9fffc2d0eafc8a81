//! In-memory index backend.
//!
//! Postings are registered per term and must be inserted pre-sorted by the
//! sort key the query will run under; the engine assumes every hit source is
//! already ordered. `open` evaluates composite predicates structurally
//! against the term postings: `Or` is a duplicate-preserving sorted merge,
//! `And` a sorted join on comparator equality, so a predicate composed by
//! leaf fusion yields exactly the hits the unfused tree would. The fixture
//! carries no folder data, so `ExcludeFolder` clauses exclude nothing.
//! Intended for tests, examples, and single-process deployments small enough
//! to hold their index in memory. Fault injection hooks exercise the
//! engine's failure paths.

use crate::{
    error::QueryError,
    hit::{QueryHit, SortKey},
    index::{HitSource, HitSourceBox, IndexReader},
    predicate::Predicate,
    target::QueryTarget,
};
use std::{
    cell::RefCell,
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
};

type PostingKey = (QueryTarget, String);

///
/// MemoryIndex
///

#[derive(Debug)]
pub struct MemoryIndex<H> {
    postings: BTreeMap<PostingKey, Vec<H>>,
    fail_open: BTreeSet<PostingKey>,
    fail_fetch_at: BTreeMap<PostingKey, usize>,
    fail_close: BTreeSet<PostingKey>,
    chunk_hints: RefCell<Vec<usize>>,
}

impl<H> Default for MemoryIndex<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> MemoryIndex<H> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            postings: BTreeMap::new(),
            fail_open: BTreeSet::new(),
            fail_fetch_at: BTreeMap::new(),
            fail_close: BTreeSet::new(),
            chunk_hints: RefCell::new(Vec::new()),
        }
    }

    /// Register the pre-sorted hit list served for a term predicate against
    /// `target`. Terms nobody registered match nothing.
    pub fn insert(&mut self, target: QueryTarget, predicate: &Predicate, hits: Vec<H>) {
        self.postings.insert((target, predicate.to_string()), hits);
    }

    /// Make `open` fail for (target, predicate).
    pub fn fail_open(&mut self, target: QueryTarget, predicate: &Predicate) {
        self.fail_open.insert((target, predicate.to_string()));
    }

    /// Make the opened source fail on its `at`-th fetch.
    pub fn fail_fetch_at(&mut self, target: QueryTarget, predicate: &Predicate, at: usize) {
        self.fail_fetch_at
            .insert((target, predicate.to_string()), at);
    }

    /// Make the opened source fail on `close`.
    pub fn fail_close(&mut self, target: QueryTarget, predicate: &Predicate) {
        self.fail_close.insert((target, predicate.to_string()));
    }

    /// Chunk hints observed by `open`, in call order.
    #[must_use]
    pub fn chunk_hints(&self) -> Vec<usize> {
        self.chunk_hints.borrow().clone()
    }
}

impl<H: QueryHit + Clone> MemoryIndex<H> {
    fn eval(&self, predicate: &Predicate, target: &QueryTarget, sort: SortKey) -> Vec<H> {
        match predicate {
            Predicate::Term { .. } => self
                .postings
                .get(&(target.clone(), predicate.to_string()))
                .cloned()
                .unwrap_or_default(),
            // no folder data in the fixture, so the exclusion matches every
            // registered hit
            Predicate::ExcludeFolder(_) => self.all_for_target(target, sort),
            Predicate::Or(clauses) => clauses.iter().fold(Vec::new(), |acc, clause| {
                merge(sort, acc, self.eval(clause, target, sort))
            }),
            Predicate::And(clauses) => {
                let mut clauses = clauses.iter();
                let Some(first) = clauses.next() else {
                    return self.all_for_target(target, sort);
                };
                clauses.fold(self.eval(first, target, sort), |acc, clause| {
                    join(sort, &acc, &self.eval(clause, target, sort))
                })
            }
        }
    }

    /// Multiset union of every posting list registered for `target`.
    fn all_for_target(&self, target: &QueryTarget, sort: SortKey) -> Vec<H> {
        self.postings
            .iter()
            .filter(|((t, _), _)| t == target)
            .fold(Vec::new(), |acc, (_, hits)| merge(sort, acc, hits.clone()))
    }
}

impl<H: QueryHit + Clone + 'static> IndexReader<H> for MemoryIndex<H> {
    fn open(
        &self,
        predicate: &Predicate,
        target: &QueryTarget,
        sort: SortKey,
        chunk_hint: usize,
    ) -> Result<HitSourceBox<H>, QueryError> {
        self.chunk_hints.borrow_mut().push(chunk_hint);

        let key = (target.clone(), predicate.to_string());
        if self.fail_open.contains(&key) {
            return Err(QueryError::index_backend(format!(
                "failed to open index for target '{target}'"
            )));
        }

        Ok(Box::new(MemoryHitSource {
            hits: self.eval(predicate, target, sort),
            pos: 0,
            fail_fetch_at: self.fail_fetch_at.get(&key).copied(),
            fail_close: self.fail_close.contains(&key),
        }))
    }
}

/// Duplicate-preserving sorted merge of two pre-sorted lists; ties keep the
/// first list's hits first.
fn merge<H: QueryHit>(sort: SortKey, a: Vec<H>, b: Vec<H>) -> Vec<H> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let mut rest = b.into_iter().peekable();
    for hit in a {
        while rest
            .peek()
            .is_some_and(|other| other.compare(sort, &hit) == Ordering::Less)
        {
            if let Some(other) = rest.next() {
                out.push(other);
            }
        }
        out.push(hit);
    }
    out.extend(rest);
    out
}

/// Sorted join on comparator equality; each agreement consumes one hit from
/// both sides, so a value's multiplicity is the minimum across the lists.
fn join<H: QueryHit + Clone>(sort: SortKey, a: &[H], b: &[H]) -> Vec<H> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].compare(sort, &b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push(a[i].clone());
                i += 1;
                j += 1;
            }
        }
    }
    out
}

///
/// MemoryHitSource
///

#[derive(Debug)]
struct MemoryHitSource<H> {
    hits: Vec<H>,
    pos: usize,
    fail_fetch_at: Option<usize>,
    fail_close: bool,
}

impl<H: Clone> HitSource<H> for MemoryHitSource<H> {
    fn next_hit(&mut self) -> Result<Option<H>, QueryError> {
        if self.fail_fetch_at.is_some_and(|at| self.pos == at) {
            return Err(QueryError::index_backend("injected fetch failure"));
        }
        if self.pos >= self.hits.len() {
            return Ok(None);
        }

        let hit = self.hits[self.pos].clone();
        self.pos = self.pos.saturating_add(1);

        Ok(Some(hit))
    }

    fn reset(&mut self) -> Result<(), QueryError> {
        self.pos = 0;
        Ok(())
    }

    fn close(&mut self) -> Result<(), QueryError> {
        if self.fail_close {
            return Err(QueryError::index_backend("injected close failure"));
        }
        Ok(())
    }
}
