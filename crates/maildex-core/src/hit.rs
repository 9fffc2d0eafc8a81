use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};

///
/// SortKey
///
/// The ordering a whole query tree is merged under. Fixed once per top-level
/// query and shared by every node of the tree; combinators compare child
/// lookahead hits with it while merging.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum SortKey {
    DateAsc,
    #[default]
    DateDesc,
    SubjectAsc,
    SubjectDesc,
    Relevance,
}

impl SortKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DateAsc => "date_asc",
            Self::DateDesc => "date_desc",
            Self::SubjectAsc => "subject_asc",
            Self::SubjectDesc => "subject_desc",
            Self::Relevance => "relevance",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

///
/// QueryHit
///
/// One search result handle. The engine treats hits as opaque; the only
/// obligation is a total order per sort key, which the merge and merge-join
/// algorithms rely on.
///
/// Intersection joins on this comparator: two hits that compare `Equal`
/// under the tree's sort key are treated as the same hit. Backends that
/// need identity joins must tie-break the sort key (e.g. by item id) so it
/// is unique per hit.
///

pub trait QueryHit: fmt::Debug {
    /// Total order under the given sort key.
    fn compare(&self, sort: SortKey, other: &Self) -> Ordering;
}
