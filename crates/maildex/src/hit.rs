use maildex_core::hit::{QueryHit, SortKey};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

///
/// MailHit
///
/// One groupware search result. Every comparator tie-breaks on ascending
/// item id, so each sort key is a unique total order per mailbox and the
/// engine's intersection join matches on item identity rather than on
/// coincidentally equal dates or subjects.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MailHit {
    pub item_id: u64,
    pub received_ms: u64,
    pub subject: String,
    pub score: u32,
}

impl MailHit {
    #[must_use]
    pub fn new(item_id: u64, received_ms: u64, subject: impl Into<String>, score: u32) -> Self {
        Self {
            item_id,
            received_ms,
            subject: subject.into(),
            score,
        }
    }

    fn tie_break(&self, other: &Self) -> Ordering {
        self.item_id.cmp(&other.item_id)
    }
}

impl QueryHit for MailHit {
    fn compare(&self, sort: SortKey, other: &Self) -> Ordering {
        let primary = match sort {
            SortKey::DateAsc => self.received_ms.cmp(&other.received_ms),
            SortKey::DateDesc => other.received_ms.cmp(&self.received_ms),
            SortKey::SubjectAsc => self.subject.cmp(&other.subject),
            SortKey::SubjectDesc => other.subject.cmp(&self.subject),
            // best match first
            SortKey::Relevance => other.score.cmp(&self.score),
        };
        primary.then_with(|| self.tie_break(other))
    }
}
