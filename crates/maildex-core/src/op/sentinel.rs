///
/// NoResultOperation
///
/// Sentinel for a subtree that statically produces no hits. The optimizer
/// collapses empty combinators to it, including the zero-child
/// intersection: intersecting nothing yields nothing.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NoResultOperation;

///
/// AllResultOperation
///
/// Sentinel for a subtree that statically matches everything: the identity
/// of intersection and the absorber of union. It yields no hits itself; a
/// caller that receives an `AllResult` root is expected to substitute a
/// match-all leaf per target partition before preparing the tree.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AllResultOperation;
