//! The minimal capability set shared by the CFG and DFG: stable node identity and adjacency
//! enumeration. Neither the CFG nor the DFG is required to use this trait internally, but both
//! expose it so that graph-shaped algorithms (dominance, reachability, printing, ...) can be
//! written once against either graph without caring which concrete edge type they carry.
//!
//! Identity here is always by id, never by reference: nodes are looked up by [NodeId], not
//! pointer equality, which is what lets the lifter talk about "the node at this offset" across
//! two independently-constructed graphs (the input CFG and the input DFG) without them sharing
//! any memory.

/// The stable identity of a node within a graph.
///
/// For a [Cfg](crate::Cfg) node this is the offset of the first instruction in the block; for a
/// [Dfg](crate::Dfg) node it is the offset of the single instruction the node represents. Ids are
/// not required to be contiguous or non-negative; synthetic ids minted during lifting are
/// negative (see [crate::LifterOptions::fresh_id_start]).
pub type NodeId = i64;

/// A view over some subset of a graph's nodes.
///
/// This is deliberately narrow: it only has to answer "which nodes are in this view", not provide
/// mutation or edge queries. [Region](crate::Region)s are the primary implementor - a region is a
/// [SubGraph] over the CFG it belongs to.
pub trait SubGraph {
    /// Iterator returned by [SubGraph::node_ids].
    type NodeIds<'a>: Iterator<Item = NodeId>
    where
        Self: 'a;

    /// The nodes that are members of this view.
    fn node_ids(&self) -> Self::NodeIds<'_>;

    /// Returns true if `id` is a member of this view.
    fn contains(&self, id: NodeId) -> bool {
        self.node_ids().any(|member| member == id)
    }

    /// The number of nodes in this view.
    fn len(&self) -> usize {
        self.node_ids().count()
    }

    /// Returns true if this view has no members.
    fn is_empty(&self) -> bool {
        self.node_ids().next().is_none()
    }
}
