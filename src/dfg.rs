//! The data-flow graph: one node per instruction, connected by typed dependency edges over an
//! abstract operand stack and named variables.
//!
//! Unlike [crate::Cfg], the DFG does not own instruction data — its nodes are keyed by the same
//! offset as the instruction they describe, and carry only the dependency structure the lifter
//! needs: which earlier instructions (or external sources) produced the values this instruction
//! consumes.

use compact_str::CompactString;

use crate::{
    error::{LiftError, Result},
    graph::NodeId,
    isa::Variable,
    OrderedMap, OrderedSet,
};

/// One stack-dependency entry: the source of a single consumed stack slot.
///
/// A slot can have more than one source when control-flow predecessors converge on the consuming
/// instruction with different producers for the same stack position — that's exactly the case the
/// lifter resolves with a φ-node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StackProducer {
    /// The node that produced this value.
    pub producer: NodeId,
    /// Which of `producer`'s pushed values this is (0 = first pushed).
    pub slot: usize,
}

/// The ordered sequence of an instruction's stack inputs, indexed by consumed-slot position (0 =
/// deepest/first-consumed).
#[derive(Debug, Default, Clone)]
pub struct StackDependencies {
    slots: Vec<OrderedSet<StackProducer>>,
}

impl StackDependencies {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The producer set for consumed-slot `index`, if this node consumes that many stack values.
    pub fn get(&self, index: usize) -> Option<&OrderedSet<StackProducer>> {
        self.slots.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrderedSet<StackProducer>> {
        self.slots.iter()
    }

    fn slot_mut(&mut self, index: usize) -> &mut OrderedSet<StackProducer> {
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, OrderedSet::default);
        }
        &mut self.slots[index]
    }
}

/// The variable inputs of an instruction: a deterministically-ordered mapping from each read
/// [Variable] to the set of instructions that may have produced its current value.
///
/// Ordered (insertion order) rather than hashed, per the spec's explicit requirement that
/// iterating variable dependencies be deterministic — the source implementation iterated a plain
/// hash map here, which made its φ-insertion order (and therefore its synthetic id numbering)
/// depend on hash iteration order.
#[derive(Debug, Clone)]
pub struct VariableDependencies<V: Variable> {
    producers: OrderedMap<V, OrderedSet<NodeId>>,
}

impl<V: Variable> Default for VariableDependencies<V> {
    fn default() -> Self {
        Self {
            producers: OrderedMap::default(),
        }
    }
}

impl<V: Variable> VariableDependencies<V> {
    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    /// Iterate `(variable, producers)` pairs in the order they were first recorded.
    pub fn iter(&self) -> impl Iterator<Item = (&V, &OrderedSet<NodeId>)> {
        self.producers.iter()
    }

    pub fn producers_of(&self, var: &V) -> Option<&OrderedSet<NodeId>> {
        self.producers.get(var)
    }

    fn entry(&mut self, var: V) -> &mut OrderedSet<NodeId> {
        self.producers.entry(var).or_default()
    }
}

#[derive(Debug, Default, Clone)]
struct Dependants {
    stack: OrderedSet<NodeId>,
    variable: OrderedSet<NodeId>,
}

impl Dependants {
    fn is_empty(&self) -> bool {
        self.stack.is_empty() && self.variable.is_empty()
    }
}

/// A node of the data-flow graph.
///
/// Exposed through [Dfg::node], rather than constructed directly — use [Dfg::add_instruction] or
/// [Dfg::add_external_source].
#[derive(Debug, Clone)]
pub struct DfgNode<V: Variable> {
    id: NodeId,
    external_name: Option<CompactString>,
    stack: StackDependencies,
    variables: VariableDependencies<V>,
}

impl<V: Variable> DfgNode<V> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// True for nodes created with [Dfg::add_external_source]: values entering the analyzed code
    /// from outside (parameters, initial locals), rather than produced by a decoded instruction.
    pub fn is_external(&self) -> bool {
        self.external_name.is_some()
    }

    /// The human-readable name of this node, if it is an [ExternalDataSourceNode].
    pub fn external_name(&self) -> Option<&str> {
        self.external_name.as_deref()
    }

    pub fn stack_dependencies(&self) -> &StackDependencies {
        &self.stack
    }

    pub fn variable_dependencies(&self) -> &VariableDependencies<V> {
        &self.variables
    }
}

/// A convenience view over a [DfgNode] known to be an external data source - see
/// [Dfg::external_source].
pub struct ExternalDataSourceNode<'a> {
    name: &'a str,
}

impl<'a> ExternalDataSourceNode<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }
}

/// The data-flow graph: one node per instruction (plus any external data sources), connected by
/// typed dependency edges over an abstract operand stack and named variables.
#[derive(Debug, Clone)]
pub struct Dfg<V: Variable> {
    nodes: crate::FxHashMap<NodeId, DfgNode<V>>,
    order: Vec<NodeId>,
    dependants: crate::FxHashMap<NodeId, Dependants>,
}

impl<V: Variable> Default for Dfg<V> {
    fn default() -> Self {
        Self {
            nodes: Default::default(),
            order: Default::default(),
            dependants: Default::default(),
        }
    }
}

impl<V: Variable> Dfg<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node for the instruction at `offset`. Its dependencies are populated
    /// afterwards via [Dfg::add_stack_dependency] and [Dfg::add_variable_dependency].
    pub fn add_instruction(&mut self, offset: NodeId) {
        self.nodes.entry(offset).or_insert_with(|| {
            self.order.push(offset);
            DfgNode {
                id: offset,
                external_name: None,
                stack: StackDependencies::default(),
                variables: VariableDependencies::default(),
            }
        });
        self.dependants.entry(offset).or_default();
    }

    /// Register a distinguished [ExternalDataSourceNode] at `offset`, carrying a human-readable
    /// `name` (e.g. `"arg0"`).
    pub fn add_external_source(&mut self, offset: NodeId, name: impl Into<CompactString>) {
        let name = name.into();
        self.nodes
            .entry(offset)
            .and_modify(|node| node.external_name = Some(name.clone()))
            .or_insert_with(|| {
                self.order.push(offset);
                DfgNode {
                    id: offset,
                    external_name: Some(name),
                    stack: StackDependencies::default(),
                    variables: VariableDependencies::default(),
                }
            });
        self.dependants.entry(offset).or_default();
    }

    pub fn node(&self, offset: NodeId) -> Option<&DfgNode<V>> {
        self.nodes.get(&offset)
    }

    pub fn contains_node(&self, offset: NodeId) -> bool {
        self.nodes.contains_key(&offset)
    }

    /// If the node at `offset` is an external data source, a view over it.
    pub fn external_source(&self, offset: NodeId) -> Option<ExternalDataSourceNode<'_>> {
        self.nodes.get(&offset).and_then(|node| {
            node.external_name
                .as_deref()
                .map(|name| ExternalDataSourceNode { name })
        })
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DfgNode<V>> {
        self.order.iter().map(move |offset| &self.nodes[offset])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Record that `consumer`'s stack-input slot `consumed_slot` may be sourced from the value
    /// `producer` pushed at its own push-position `produced_slot`.
    ///
    /// Updates `producer`'s [Dependants] in lockstep: this and [Dfg::disconnect] are the only ways
    /// to mutate dependency edges, which is what keeps the forward edges and the reverse index
    /// from drifting apart.
    ///
    /// Fails with [LiftError::MissingDfgNode] if either node is unknown.
    pub fn add_stack_dependency(
        &mut self,
        consumer: NodeId,
        consumed_slot: usize,
        producer: NodeId,
        produced_slot: usize,
    ) -> Result<()> {
        if !self.nodes.contains_key(&consumer) {
            return Err(LiftError::MissingDfgNode { offset: consumer });
        }
        if !self.nodes.contains_key(&producer) {
            return Err(LiftError::MissingDfgNode { offset: producer });
        }

        self.nodes
            .get_mut(&consumer)
            .unwrap()
            .stack
            .slot_mut(consumed_slot)
            .insert(StackProducer {
                producer,
                slot: produced_slot,
            });
        self.dependants.entry(producer).or_default().stack.insert(consumer);
        Ok(())
    }

    /// Record that `consumer` may read `var`'s current value from `producer`.
    ///
    /// Same lockstep-update discipline as [Dfg::add_stack_dependency].
    pub fn add_variable_dependency(&mut self, consumer: NodeId, var: V, producer: NodeId) -> Result<()> {
        if !self.nodes.contains_key(&consumer) {
            return Err(LiftError::MissingDfgNode { offset: consumer });
        }
        if !self.nodes.contains_key(&producer) {
            return Err(LiftError::MissingDfgNode { offset: producer });
        }

        self.nodes.get_mut(&consumer).unwrap().variables.entry(var).insert(producer);
        self.dependants.entry(producer).or_default().variable.insert(consumer);
        Ok(())
    }

    /// Remove all of `node`'s own dependencies, and remove `node` from every dependant's
    /// dependency lists, isolating it from the graph.
    pub fn disconnect(&mut self, node: NodeId) {
        if let Some(existing) = self.nodes.get_mut(&node) {
            existing.stack = StackDependencies::default();
            existing.variables = VariableDependencies::default();
        }
        for other in self.nodes.values_mut() {
            for slot in other.stack.slots.iter_mut() {
                slot.retain(|producer| producer.producer != node);
            }
            for producers in other.variables.producers.values_mut() {
                producers.shift_remove(&node);
            }
        }
        self.dependants.remove(&node);
        for dependants in self.dependants.values_mut() {
            dependants.stack.shift_remove(&node);
            dependants.variable.shift_remove(&node);
        }
    }

    /// Whether any other node depends (via stack or variable edge) on `node`.
    pub fn has_dependants(&self, node: NodeId) -> bool {
        self.dependants.get(&node).map(|d| !d.is_empty()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Var(&'static str);

    impl Variable for Var {
        fn name(&self) -> &str {
            self.0
        }
    }

    /// `disconnect` must scrub a producer in every direction at once: its own forward
    /// dependencies, its dependants' stack-producer sets, its dependants' variable-producer sets,
    /// and the `Dependants` entry of whatever it itself depended on.
    #[test]
    fn disconnect_scrubs_stack_and_variable_edges_both_ways() {
        let mut dfg: Dfg<Var> = Dfg::new();
        for offset in [0, 1, 2, 3] {
            dfg.add_instruction(offset);
        }

        // 0 (Q) --stack--> 1 (P) --stack--> 2 (C1)
        //                   \--variable "v"--> 3 (C2)
        dfg.add_stack_dependency(1, 0, 0, 0).unwrap();
        dfg.add_stack_dependency(2, 0, 1, 0).unwrap();
        dfg.add_variable_dependency(3, Var("v"), 1).unwrap();

        assert!(dfg.has_dependants(0), "Q should have P as a dependant before disconnect");
        assert!(dfg.has_dependants(1), "P should have C1 and C2 as dependants before disconnect");

        dfg.disconnect(1);

        // P's own forward dependencies are gone.
        let p = dfg.node(1).unwrap();
        assert!(p.stack_dependencies().get(0).map(|s| s.is_empty()).unwrap_or(true));
        assert!(p.variable_dependencies().is_empty());

        // Q no longer sees P as a dependant - the reverse index for what P used to depend on.
        assert!(!dfg.has_dependants(0), "Q should lose P as a dependant after disconnect");

        // Nothing depends on P any more either.
        assert!(!dfg.has_dependants(1), "P should have no dependants after disconnect");

        // C1's stack dependency on P is gone - the forward edge from the consumer's side.
        let c1 = dfg.node(2).unwrap();
        assert!(c1
            .stack_dependencies()
            .get(0)
            .map(|producers| !producers.iter().any(|p| p.producer == 1))
            .unwrap_or(true));

        // C2's variable dependency on P is gone too.
        let c2 = dfg.node(3).unwrap();
        let producers = c2.variable_dependencies().producers_of(&Var("v"));
        assert!(producers.map(|set| !set.contains(&1)).unwrap_or(true));
    }
}
