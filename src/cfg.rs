mod region;

pub use self::region::{BasicRegion, ExceptionHandlerRegion, Region, RegionId};

use crate::{
    error::{LiftError, Result},
    graph::{NodeId, SubGraph},
};

/// The kind of control transfer a [CfgEdge] represents.
///
/// A node has at most one [EdgeKind::FallThrough] and at most one [EdgeKind::Unconditional]
/// successor (enforced by [Cfg::connect]); [EdgeKind::Conditional] and [EdgeKind::Abnormal] edges
/// may be multiple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Falls into the next block with no explicit branch.
    FallThrough,
    /// An unconditional branch/jump.
    Unconditional,
    /// One arm of a conditional branch.
    Conditional,
    /// A control transfer outside normal structured flow, e.g. into an exception handler.
    Abnormal,
}

impl EdgeKind {
    /// Whether this edge kind is limited to at most one instance per origin node.
    fn is_singular(self) -> bool {
        matches!(self, Self::FallThrough | Self::Unconditional)
    }

    fn name(self) -> &'static str {
        match self {
            Self::FallThrough => "fall-through",
            Self::Unconditional => "unconditional",
            Self::Conditional => "conditional",
            Self::Abnormal => "abnormal",
        }
    }
}

/// A directed, typed edge between two [Cfg] nodes, identified by offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CfgEdge {
    pub origin: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
}

/// A basic block: an ordered instruction list owned by the graph, keyed by the offset of its
/// first instruction.
#[derive(Debug, Clone)]
pub struct CfgNode<I> {
    offset: NodeId,
    instructions: Vec<I>,
    out_edges: Vec<CfgEdge>,
}

impl<I> CfgNode<I> {
    pub fn offset(&self) -> NodeId {
        self.offset
    }

    pub fn instructions(&self) -> &[I] {
        &self.instructions
    }

    pub fn out_edges(&self) -> &[CfgEdge] {
        &self.out_edges
    }
}

/// A control-flow graph: basic blocks of `I` connected by typed edges, with a hierarchical region
/// structure and a single entrypoint.
///
/// `I` is left generic so the same graph shape serves both the input (`Cfg<TInstruction>`, built
/// externally) and the output of lifting (`Cfg<Statement<TInstruction>>`, built by
/// [crate::lift]).
#[derive(Debug, Clone)]
pub struct Cfg<I> {
    nodes: crate::FxHashMap<NodeId, CfgNode<I>>,
    order: Vec<NodeId>,
    entrypoint: Option<NodeId>,
    regions: Vec<Region>,
    roots: Vec<RegionId>,
    node_region: crate::FxHashMap<NodeId, RegionId>,
}

impl<I> Default for Cfg<I> {
    fn default() -> Self {
        Self {
            nodes: Default::default(),
            order: Default::default(),
            entrypoint: None,
            regions: Default::default(),
            roots: Default::default(),
            node_region: Default::default(),
        }
    }
}

impl<I> Cfg<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new node owned by this graph, keyed by `offset`.
    ///
    /// Fails with [LiftError::DuplicateNode] if a node with this offset already exists.
    pub fn add_node(&mut self, offset: NodeId, instructions: Vec<I>) -> Result<()> {
        if self.nodes.contains_key(&offset) {
            return Err(LiftError::DuplicateNode { offset });
        }
        self.nodes.insert(
            offset,
            CfgNode {
                offset,
                instructions,
                out_edges: Vec::new(),
            },
        );
        self.order.push(offset);
        Ok(())
    }

    pub fn node(&self, offset: NodeId) -> Option<&CfgNode<I>> {
        self.nodes.get(&offset)
    }

    pub fn contains_node(&self, offset: NodeId) -> bool {
        self.nodes.contains_key(&offset)
    }

    /// Nodes in the order they were added to the graph (not, in general, offset order, though
    /// most callers add nodes in ascending-offset order).
    pub fn nodes(&self) -> impl Iterator<Item = &CfgNode<I>> {
        self.order.iter().map(move |offset| &self.nodes[offset])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create an outgoing edge from `origin` to `target`.
    ///
    /// Fails with [LiftError::DanglingEdge] if either endpoint is not a node of this graph, or
    /// [LiftError::MultipleSuccessors] if `kind` is [EdgeKind::FallThrough] or
    /// [EdgeKind::Unconditional] and `origin` already has an edge of that kind. An edge identical
    /// to one that already exists (same origin, target, and kind) is accepted but not duplicated.
    pub fn connect(&mut self, origin: NodeId, target: NodeId, kind: EdgeKind) -> Result<()> {
        if !self.nodes.contains_key(&origin) {
            return Err(LiftError::DanglingEdge {
                origin,
                endpoint: origin,
            });
        }
        if !self.nodes.contains_key(&target) {
            return Err(LiftError::DanglingEdge {
                origin,
                endpoint: target,
            });
        }

        let out_edges = &mut self.nodes.get_mut(&origin).unwrap().out_edges;
        if out_edges
            .iter()
            .any(|edge| edge.target == target && edge.kind == kind)
        {
            return Ok(());
        }
        if kind.is_singular() && out_edges.iter().any(|edge| edge.kind == kind) {
            return Err(LiftError::MultipleSuccessors {
                origin,
                kind: kind.name(),
            });
        }

        out_edges.push(CfgEdge { origin, target, kind });
        Ok(())
    }

    /// All edges in this graph, in node-insertion then per-node-insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &CfgEdge> {
        self.nodes().flat_map(|node| node.out_edges.iter())
    }

    pub fn entrypoint(&self) -> Option<NodeId> {
        self.entrypoint
    }

    /// Designate `offset` as this graph's entrypoint.
    ///
    /// Fails with [LiftError::UnknownEntrypoint] if `offset` is not a node of this graph.
    pub fn set_entrypoint(&mut self, offset: NodeId) -> Result<()> {
        if !self.nodes.contains_key(&offset) {
            return Err(LiftError::UnknownEntrypoint { offset });
        }
        self.entrypoint = Some(offset);
        Ok(())
    }
}

impl<I> SubGraph for Cfg<I> {
    type NodeIds<'a>
        = std::iter::Copied<std::slice::Iter<'a, NodeId>>
    where
        Self: 'a;

    fn node_ids(&self) -> Self::NodeIds<'_> {
        self.order.iter().copied()
    }
}
