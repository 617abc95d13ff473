use crate::graph::NodeId;

/// The structured error surface for this crate.
///
/// Every variant names the offending offset or identifier so that a caller can point back at the
/// exact instruction, node, or region that failed validation. There is no partial-success path:
/// [crate::lift] either returns a complete output graph or one of these.
#[derive(Debug, thiserror::Error)]
pub enum LiftError {
    /// The DFG has no node for an instruction at this offset, even though the CFG contains an
    /// instruction there.
    #[error("dfg has no node for instruction at offset {offset}")]
    MissingDfgNode { offset: NodeId },

    /// A CFG edge names an endpoint that is not a node of the graph.
    #[error("cfg edge from {origin} references unknown node {endpoint}")]
    DanglingEdge { origin: NodeId, endpoint: NodeId },

    /// A region (or one of its handlers) names a node that is not a member of the CFG.
    #[error("region {region:?} references unknown node {node}")]
    UnknownRegionMember { region: RegionRef, node: NodeId },

    /// [crate::Cfg::add_node] was called with an offset that already identifies a node.
    #[error("duplicate node offset {offset}")]
    DuplicateNode { offset: NodeId },

    /// A node was given more than one fall-through, or more than one unconditional, successor.
    #[error("node {origin} already has a {kind} successor")]
    MultipleSuccessors { origin: NodeId, kind: &'static str },

    /// [crate::Cfg::set_entrypoint] was called with an id that is not a member of the graph.
    #[error("entrypoint {offset} is not a node of this graph")]
    UnknownEntrypoint { offset: NodeId },

    /// An operation was attempted against a region in a kind that does not support it (e.g.
    /// moving a node directly into an [crate::ExceptionHandlerRegion] rather than its protected
    /// region).
    #[error("unsupported region kind: {kind} ({detail})")]
    UnsupportedRegionKind { kind: &'static str, detail: &'static str },

    /// The ISA reported an inconsistent accounting of pushes/pops/writes for one instruction,
    /// e.g. its stack-push count disagreed with the number of stack slots the DFG expects it to
    /// produce.
    #[error(
        "isa contract violation for instruction at offset {offset}: {expected} expected, \
         {actual} actual ({detail})"
    )]
    IsaContract {
        offset: NodeId,
        expected: usize,
        actual: usize,
        detail: &'static str,
    },
}

/// A lightweight, `Debug`-only handle to a region, used solely to name the offending region in
/// [LiftError::UnknownRegionMember] without requiring [crate::Region] itself to implement
/// `Clone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionRef(pub(crate) crate::RegionId);

pub type Result<T> = core::result::Result<T, LiftError>;
