//! Core query execution engine for maildex: the operation tree
//! (leaf/union/intersection), the sorted-merge iteration protocol, the
//! algebraic optimizer, and the session driver, plus the seams the engine
//! consumes (index capability, hit comparator, observability sink).
#![warn(unreachable_pub)]

pub mod backend;
pub mod error;
pub mod hit;
pub mod index;
pub mod obs;
pub mod op;
pub mod predicate;
pub mod session;
pub mod target;


///
/// Prelude
///
/// Prelude contains only query vocabulary.
/// No errors, backends, sinks, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        hit::{QueryHit, SortKey},
        op::QueryOperation,
        predicate::{Folder, Predicate},
        session::SearchSession,
        target::{QueryTarget, QueryTargetSet},
    };
}
