//! Engine observability boundary.
//!
//! The engine holds no global logger. Callers hand an [`EngineSink`] in
//! explicitly (through [`crate::index::PrepareContext`] and the cleanup
//! path) and instrument at whatever boundary suits them; [`NoopSink`] is the
//! zero-cost default.

use crate::op::OpKind;

///
/// EngineEvent
///

#[derive(Clone, Copy, Debug)]
pub enum EngineEvent<'a> {
    /// A raw tree was rewritten by the optimizer.
    TreeOptimized { before: OpKind, after: OpKind },

    /// One node opened its backend resources and primed its lookahead.
    Prepared { kind: OpKind, children: usize },

    /// Target pruning removed incompatible children.
    TargetsPruned { removed: usize },

    /// A child's resource release failed during cleanup. Best-effort path:
    /// reported here, never raised, siblings still released.
    CleanupFailed { kind: OpKind, message: &'a str },
}

///
/// EngineSink
///

pub trait EngineSink {
    fn record(&self, event: EngineEvent<'_>);
}

///
/// NoopSink
///
/// Default sink that drops every event.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl EngineSink for NoopSink {
    fn record(&self, _: EngineEvent<'_>) {}
}
