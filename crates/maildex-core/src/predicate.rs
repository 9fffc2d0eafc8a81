use serde::{Deserialize, Serialize};
use std::fmt;

///
/// Folder
///
/// System folders a leaf predicate can be fenced away from. The spam/trash
/// fixup appends `ExcludeFolder` clauses for any of these the caller did not
/// explicitly opt into.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Folder {
    Junk,
    Trash,
}

impl Folder {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Junk => "junk",
            Self::Trash => "trash",
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

///
/// Predicate
///
/// The search predicate a leaf evaluates against its target partition.
/// The engine never evaluates predicates itself; it only composes them
/// during optimizer fusion and hands them to the index capability.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Predicate {
    /// One indexed term, e.g. `subject:invoice`.
    Term { field: String, text: String },

    /// Excludes hits filed under a system folder.
    ExcludeFolder(Folder),

    /// Conjunction. Built by intersection-mode leaf fusion and the
    /// spam/trash fixup.
    And(Vec<Predicate>),

    /// Disjunction. Built by union-mode leaf fusion.
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn term(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Term {
            field: field.into(),
            text: text.into(),
        }
    }

    /// Conjoin two predicates, flattening one level of `And` nesting.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        let mut clauses = match self {
            Self::And(clauses) => clauses,
            lhs => vec![lhs],
        };
        match other {
            Self::And(more) => clauses.extend(more),
            rhs => clauses.push(rhs),
        }
        Self::And(clauses)
    }

    /// Disjoin two predicates, flattening one level of `Or` nesting.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        let mut clauses = match self {
            Self::Or(clauses) => clauses,
            lhs => vec![lhs],
        };
        match other {
            Self::Or(more) => clauses.extend(more),
            rhs => clauses.push(rhs),
        }
        Self::Or(clauses)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Term { field, text } => write!(f, "{field}:{text}"),
            Self::ExcludeFolder(folder) => write!(f, "-in:{folder}"),
            Self::And(clauses) => {
                write!(f, "(")?;
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    write!(f, "{clause}")?;
                }
                write!(f, ")")
            }
            Self::Or(clauses) => {
                write!(f, "(")?;
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        write!(f, " OR ")?;
                    }
                    write!(f, "{clause}")?;
                }
                write!(f, ")")
            }
        }
    }
}
