use super::*;

/// The identity of a [Region] within a [Cfg]'s region arena.
///
/// Stable for the lifetime of the region: even though the set of nodes a region contains can
/// change (via [Cfg::move_node_to_region]), its id never does. This is what lets
/// [ExceptionHandlerRegion::protected] hold a `RegionId` rather than a node-set snapshot and still
/// satisfy "identity-stable for its lifetime".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(pub(crate) u32);

/// A region that contains a flat set of nodes plus nested child regions.
#[derive(Debug, Default, Clone)]
pub struct BasicRegion {
    nodes: crate::OrderedSet<NodeId>,
    children: Vec<RegionId>,
}

impl BasicRegion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    pub fn children(&self) -> &[RegionId] {
        &self.children
    }

    pub(crate) fn insert(&mut self, node: NodeId) {
        self.nodes.insert(node);
    }

    pub(crate) fn remove(&mut self, node: NodeId) {
        self.nodes.shift_remove(&node);
    }
}

impl SubGraph for BasicRegion {
    type NodeIds<'a> = std::iter::Copied<indexmap::set::Iter<'a, NodeId>>;

    fn node_ids(&self) -> Self::NodeIds<'_> {
        self.nodes.iter().copied()
    }
}

/// One exception-handler region: a protected region (the "try"), and an ordered list of handler
/// regions (the "catch"es).
///
/// The protected region is held by [RegionId] rather than by value specifically so that it is
/// identity-stable: the same arena slot is mutated in place as nodes move in and out of it, it is
/// never replaced by a fresh region with a new id.
#[derive(Debug, Clone)]
pub struct ExceptionHandlerRegion {
    protected: RegionId,
    handlers: Vec<RegionId>,
}

impl ExceptionHandlerRegion {
    pub fn new(protected: RegionId, handlers: Vec<RegionId>) -> Self {
        Self { protected, handlers }
    }

    pub fn protected(&self) -> RegionId {
        self.protected
    }

    pub fn handlers(&self) -> &[RegionId] {
        &self.handlers
    }
}

/// A hierarchical grouping of CFG nodes, preserved across lifting.
///
/// Tagged union rather than an open trait hierarchy: the lifter's region transform needs to match
/// exhaustively over the region kinds it knows how to preserve (see
/// [LiftError::UnsupportedRegionKind](crate::LiftError::UnsupportedRegionKind)), which an open
/// inheritance hierarchy would not let it do.
#[derive(Debug, Clone)]
pub enum Region {
    Basic(BasicRegion),
    ExceptionHandler(ExceptionHandlerRegion),
}

impl Region {
    pub fn as_basic(&self) -> Option<&BasicRegion> {
        match self {
            Self::Basic(region) => Some(region),
            Self::ExceptionHandler(_) => None,
        }
    }

    pub fn as_exception_handler(&self) -> Option<&ExceptionHandlerRegion> {
        match self {
            Self::ExceptionHandler(region) => Some(region),
            Self::Basic(_) => None,
        }
    }

    /// A human-readable name for the variant, used only in error messages.
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::Basic(_) => "basic",
            Self::ExceptionHandler(_) => "exception-handler",
        }
    }
}

impl<I> Cfg<I> {
    /// Add `region` to this graph's region arena, optionally nesting it as a child of `parent`.
    ///
    /// `parent`, if given, must currently hold a [Region::Basic] — nodes and child regions are
    /// only ever attached directly to basic regions; an [ExceptionHandlerRegion] only ever has
    /// its protected region and handler regions as children, which are wired up by the caller via
    /// [ExceptionHandlerRegion::new] before the region is added.
    pub fn add_region(&mut self, region: Region, parent: Option<RegionId>) -> RegionId {
        let id = RegionId(self.regions.len() as u32);
        self.regions.push(region);
        match parent {
            Some(parent_id) => match &mut self.regions[parent_id.0 as usize] {
                Region::Basic(basic) => basic.children.push(id),
                Region::ExceptionHandler(_) => {
                    panic!("exception handler regions do not accept arbitrary children")
                }
            },
            None => self.roots.push(id),
        }
        id
    }

    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.0 as usize]
    }

    /// The regions with no parent, in the order they were added.
    pub fn root_regions(&self) -> &[RegionId] {
        &self.roots
    }

    /// The immediate region `node` currently belongs to, if any.
    pub fn region_of(&self, node: NodeId) -> Option<RegionId> {
        self.node_region.get(&node).copied()
    }

    /// Move `node` into `region`, atomically with respect to the "at most one immediate region
    /// per node" invariant: if the node already belongs to a region, it is removed from that
    /// region's node set before being inserted into the new one.
    ///
    /// `region` must currently hold a [Region::Basic] (which includes the protected region of an
    /// [ExceptionHandlerRegion], reached via [ExceptionHandlerRegion::protected]).
    pub fn move_node_to_region(&mut self, node: NodeId, region: RegionId) -> Result<()> {
        if !self.nodes.contains_key(&node) {
            return Err(LiftError::UnknownRegionMember {
                region: crate::error::RegionRef(region),
                node,
            });
        }

        if let Some(old) = self.node_region.remove(&node) {
            if let Region::Basic(basic) = &mut self.regions[old.0 as usize] {
                basic.remove(node);
            }
        }

        match &mut self.regions[region.0 as usize] {
            Region::Basic(basic) => basic.insert(node),
            unsupported @ Region::ExceptionHandler(_) => {
                return Err(LiftError::UnsupportedRegionKind {
                    kind: unsupported.kind_name(),
                    detail: "move directly into its protected region instead",
                });
            }
        }
        self.node_region.insert(node, region);
        Ok(())
    }
}
