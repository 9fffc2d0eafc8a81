//! ## Crate layout
//! - `core`: the query execution engine (operation tree, optimizer, merge
//!   iteration, session driver) plus the seams it consumes.
//! - `hit`: the groupware hit type with identity-safe sort comparators.
//!
//! The `prelude` module mirrors the surface a request layer uses to build
//! and run a search.

pub use maildex_core as core;

pub mod hit;

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use crate::core::error::QueryError;
pub use hit::MailHit;

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        core::{
            hit::{QueryHit, SortKey},
            op::QueryOperation,
            predicate::{Folder, Predicate},
            session::SearchSession,
            target::{QueryTarget, QueryTargetSet},
        },
        hit::MailHit,
    };
    pub use serde::{Deserialize, Serialize};
}
