//! The AST lifter: rewrites every basic block of a [Cfg] into [Statement]s, threading SSA
//! variable versioning and φ-node insertion through the block boundaries described by a [Dfg].


use compact_str::CompactString;

use crate::ast::{AstVariable, Expression, Statement, StatementKind};
use crate::cfg::{BasicRegion, ExceptionHandlerRegion, Region, RegionId};
use crate::error::{LiftError, Result};
use crate::graph::NodeId;
use crate::isa::{Isa, Variable};
use crate::{Cfg, CfgNode, Dfg, LifterOptions, OrderedSet};

/// A canonical, sorted snapshot of the `(variable name, version)` pairs a φ-merge collapses.
///
/// Sorted by `(name, version)` so that two instructions whose variable-dependency merges name the
/// same set of versions - regardless of the order the DFG happens to enumerate producers in -
/// land on the same [LiftState::phi_slots] entry. Keyed by name rather than by `Variable` directly
/// because the snapshot has to outlive any one concrete `Variable` value and be usable as a hash
/// key independent of the instruction type; see the uniqueness assumption documented on
/// [AstVariable::Versioned].
type VariableSnapshot = Vec<(CompactString, u32)>;

/// Lifts `cfg`'s instructions (typed `I`) into [Statement]s, following the dependency structure
/// recorded in `dfg` and querying `isa` for instruction shape.
///
/// The four bookkeeping maps described for per-block rewriting - pushed stack slots, SSA version
/// counters, interned versioned names, and φ-slot memoization - are scoped to a single call: a
/// fresh [LiftState] is created here and dropped once lifting completes, never reused or exposed
/// as shared state.
pub fn lift<I, B>(cfg: &Cfg<I>, dfg: &Dfg<B::Variable>, isa: &B, options: &LifterOptions) -> Result<Cfg<Statement<I>>>
where
    I: Clone,
    B: Isa<I>,
{
    let mut state = LiftState::new(dfg, isa, options);
    let mut output = Cfg::new();

    // Per-block rewriting order matters: SSA version counters are global across the whole run, so
    // processing blocks in ascending-offset order (rather than whatever order they happen to have
    // been inserted into the input graph) is what the "deterministic order" ordering guarantee
    // promises callers.
    let mut blocks: Vec<&CfgNode<I>> = cfg.nodes().collect();
    blocks.sort_by_key(|block| block.offset());

    for block in blocks {
        log::debug!(target: "lift::block", "lifting block at offset {}", block.offset());
        let statements = state.lift_block(block)?;
        output.add_node(block.offset(), statements)?;
    }

    let region_map = transform_regions(cfg, &mut output)?;
    for block in cfg.nodes() {
        if let Some(region) = cfg.region_of(block.offset()) {
            let mapped = *region_map
                .get(&region)
                .expect("every reachable region was transformed above");
            output.move_node_to_region(block.offset(), mapped)?;
        }
    }
    for edge in cfg.edges() {
        output.connect(edge.origin, edge.target, edge.kind)?;
    }
    if let Some(entry) = cfg.entrypoint() {
        output.set_entrypoint(entry)?;
    }

    Ok(output)
}

/// Recreates `cfg`'s region tree inside `output`, returning the old-id → new-id correspondence.
///
/// Regions are visited from [Cfg::root_regions] down through [BasicRegion::children]; an
/// [ExceptionHandlerRegion] additionally pulls in its protected and handler regions, which are
/// arena entries reached only via [ExceptionHandlerRegion::protected]/
/// [ExceptionHandlerRegion::handlers], not via the parent/child adjacency, so they are resolved
/// lazily (and memoized) the first time some exception-handler region points at them.
fn transform_regions<I, O>(cfg: &Cfg<I>, output: &mut Cfg<O>) -> Result<crate::FxHashMap<RegionId, RegionId>> {
    let mut mapped = crate::FxHashMap::default();
    for &root in cfg.root_regions() {
        resolve_region(cfg, output, root, None, &mut mapped)?;
    }
    Ok(mapped)
}

fn resolve_region<I, O>(
    cfg: &Cfg<I>,
    output: &mut Cfg<O>,
    old: RegionId,
    parent: Option<RegionId>,
    mapped: &mut crate::FxHashMap<RegionId, RegionId>,
) -> Result<RegionId> {
    if let Some(&existing) = mapped.get(&old) {
        return Ok(existing);
    }

    let new_id = match cfg.region(old) {
        Region::Basic(basic) => {
            let new_id = output.add_region(Region::Basic(BasicRegion::new()), parent);
            mapped.insert(old, new_id);
            for &child in basic.children() {
                resolve_region(cfg, output, child, Some(new_id), mapped)?;
            }
            new_id
        }
        Region::ExceptionHandler(handler) => {
            let protected = handler.protected();
            let handlers: Vec<RegionId> = handler.handlers().to_vec();
            let new_protected = resolve_region(cfg, output, protected, None, mapped)?;
            let mut new_handlers = Vec::with_capacity(handlers.len());
            for old_handler in handlers {
                new_handlers.push(resolve_region(cfg, output, old_handler, None, mapped)?);
            }
            let new_id = output.add_region(
                Region::ExceptionHandler(ExceptionHandlerRegion::new(new_protected, new_handlers)),
                parent,
            );
            mapped.insert(old, new_id);
            new_id
        }
    };

    Ok(new_id)
}

/// The per-lift-call bookkeeping described in the per-block rewriting algorithm.
struct LiftState<'a, I, B>
where
    B: Isa<I>,
{
    dfg: &'a Dfg<B::Variable>,
    isa: &'a B,
    /// The stack slot(s) each instruction offset pushed, for consumers to bind against.
    stack_slots: crate::FxHashMap<NodeId, Vec<AstVariable>>,
    /// Current SSA version counter per underlying variable.
    variable_versions: crate::FxHashMap<B::Variable, u32>,
    /// Interned `(variable, version) -> AstVariable` names.
    versioned_ast_variables: crate::FxHashMap<(B::Variable, u32), AstVariable>,
    /// Which version a given offset assigned to a given variable - the lookup a multi-producer
    /// variable merge needs to build its snapshot set, since `variable_versions` only tracks the
    /// *current* counter, not which offset produced which historical version.
    written_versions: crate::FxHashMap<(NodeId, B::Variable), u32>,
    /// Memoized φ-results for variable-dependency merges, keyed by canonical snapshot.
    phi_slots: crate::FxHashMap<VariableSnapshot, AstVariable>,
    next_stack_slot: u64,
    next_phi_slot: u64,
    next_fresh_id: i64,
    _instruction: std::marker::PhantomData<fn() -> I>,
}

impl<'a, I, B> LiftState<'a, I, B>
where
    I: Clone,
    B: Isa<I>,
{
    fn new(dfg: &'a Dfg<B::Variable>, isa: &'a B, options: &LifterOptions) -> Self {
        Self {
            dfg,
            isa,
            stack_slots: crate::FxHashMap::default(),
            variable_versions: crate::FxHashMap::default(),
            versioned_ast_variables: crate::FxHashMap::default(),
            written_versions: crate::FxHashMap::default(),
            phi_slots: crate::FxHashMap::default(),
            next_stack_slot: 0,
            next_phi_slot: 0,
            next_fresh_id: options.fresh_id_start(),
            _instruction: std::marker::PhantomData,
        }
    }

    fn fresh_id(&mut self) -> i64 {
        let id = self.next_fresh_id;
        self.next_fresh_id -= 1;
        id
    }

    fn intern_versioned(&mut self, var: &B::Variable, version: u32) -> AstVariable {
        self.versioned_ast_variables
            .entry((var.clone(), version))
            .or_insert_with(|| AstVariable::Versioned {
                name: CompactString::from(var.name()),
                version,
            })
            .clone()
    }

    fn external_name(&self, offset: NodeId) -> Result<CompactString> {
        self.dfg
            .external_source(offset)
            .map(|external| CompactString::from(external.name()))
            .ok_or(LiftError::MissingDfgNode { offset })
    }

    fn lift_block(&mut self, block: &CfgNode<I>) -> Result<Vec<Statement<I>>> {
        let mut statements: Vec<Statement<I>> = Vec::new();
        let mut phi_cursor: usize = 0;

        for instruction in block.instructions() {
            let offset = self.isa.offset(instruction);
            let dfg_node = self
                .dfg
                .node(offset)
                .ok_or(LiftError::MissingDfgNode { offset })?;

            let declared_pops = self.isa.stack_pop_count(instruction);
            let actual_pops = dfg_node.stack_dependencies().len();
            if declared_pops != actual_pops {
                return Err(LiftError::IsaContract {
                    offset,
                    expected: declared_pops,
                    actual: actual_pops,
                    detail: "stack_pop_count disagrees with the DFG's recorded stack dependencies",
                });
            }

            let mut arguments = Vec::with_capacity(
                dfg_node.stack_dependencies().len() + dfg_node.variable_dependencies().len(),
            );

            // Step 1 - stack argument sources.
            for producers in dfg_node.stack_dependencies().iter() {
                let arg = self.resolve_stack_argument(offset, producers, &mut statements, &mut phi_cursor)?;
                arguments.push(Expression::Variable(arg));
            }

            // Step 2 - variable argument sources, in deterministic (insertion) order.
            let variable_producers: Vec<_> = dfg_node
                .variable_dependencies()
                .iter()
                .map(|(var, producers)| (var.clone(), producers.clone()))
                .collect();
            for (var, producers) in variable_producers {
                let arg = self.resolve_variable_argument(&var, &producers, &mut statements, &mut phi_cursor)?;
                arguments.push(Expression::Variable(arg));
            }

            // Step 3 - the instruction expression itself.
            let expr = Expression::Instruction {
                offset,
                instruction: instruction.clone(),
                arguments,
            };

            // Step 4 - write targets: fresh stack slots, then bumped variable versions.
            let written = self.isa.written_variables(instruction);
            let push_count = self.isa.stack_push_count(instruction);

            let mut pushed = Vec::with_capacity(push_count);
            for _ in 0..push_count {
                let slot = AstVariable::StackSlot(self.next_stack_slot);
                self.next_stack_slot += 1;
                pushed.push(slot);
            }

            let mut written_targets = Vec::with_capacity(written.len());
            for var in &written {
                let version = match self.variable_versions.get(var) {
                    None => 0,
                    Some(current) => current + 1,
                };
                self.variable_versions.insert(var.clone(), version);
                self.written_versions.insert((offset, var.clone()), version);
                written_targets.push(self.intern_versioned(var, version));
            }

            self.stack_slots.insert(offset, pushed.clone());

            // Step 5 - emit.
            let has_dependants = self.dfg.has_dependants(offset);
            if written.is_empty() && !has_dependants {
                statements.push(Statement::new(offset, StatementKind::Expression(expr)));
            } else {
                let mut targets = pushed;
                targets.extend(written_targets);
                statements.push(Statement::new(offset, StatementKind::Assignment { targets, value: expr }));
            }
        }

        Ok(statements)
    }

    /// Resolves one of `offset`'s stack-input slots, synthesizing and prepending a [StatementKind::Phi]
    /// if more than one producer converges on it.
    fn resolve_stack_argument(
        &mut self,
        offset: NodeId,
        producers: &OrderedSet<crate::dfg::StackProducer>,
        statements: &mut Vec<Statement<I>>,
        phi_cursor: &mut usize,
    ) -> Result<AstVariable> {
        match producers.len() {
            0 => Err(LiftError::IsaContract {
                offset,
                expected: 1,
                actual: 0,
                detail: "stack dependency slot has no recorded producer",
            }),
            1 => {
                let producer = producers.iter().next().unwrap();
                self.resolve_stack_producer(*producer)
            }
            _ => {
                let mut sources = Vec::with_capacity(producers.len());
                for producer in producers.iter() {
                    sources.push(Expression::Variable(self.resolve_stack_producer(*producer)?));
                }
                let result = AstVariable::PhiSlot(self.next_phi_slot);
                self.next_phi_slot += 1;
                log::trace!(target: "lift::phi", "{result} merges {} stack producers at {offset}", sources.len());
                let id = self.fresh_id();
                statements.insert(*phi_cursor, Statement::new(id, StatementKind::Phi {
                    result: result.clone(),
                    sources,
                }));
                *phi_cursor += 1;
                Ok(result)
            }
        }
    }

    fn resolve_stack_producer(&self, producer: crate::dfg::StackProducer) -> Result<AstVariable> {
        let node = self
            .dfg
            .node(producer.producer)
            .ok_or(LiftError::MissingDfgNode { offset: producer.producer })?;
        if node.is_external() {
            return Ok(AstVariable::External(self.external_name(producer.producer)?));
        }
        let slots = self
            .stack_slots
            .get(&producer.producer)
            .ok_or(LiftError::MissingDfgNode { offset: producer.producer })?;
        slots.get(producer.slot).cloned().ok_or(LiftError::IsaContract {
            offset: producer.producer,
            expected: producer.slot + 1,
            actual: slots.len(),
            detail: "stack producer slot index exceeds its declared push count",
        })
    }

    /// Resolves a variable-input argument, synthesizing and prepending a memoized
    /// [StatementKind::Phi] if more than one producer converges on it.
    fn resolve_variable_argument(
        &mut self,
        var: &B::Variable,
        producers: &OrderedSet<NodeId>,
        statements: &mut Vec<Statement<I>>,
        phi_cursor: &mut usize,
    ) -> Result<AstVariable> {
        if producers.len() <= 1 {
            let version = *self.variable_versions.entry(var.clone()).or_insert(0);
            return Ok(self.intern_versioned(var, version));
        }

        let mut snapshot: VariableSnapshot = Vec::with_capacity(producers.len());
        let name = CompactString::from(var.name());
        for &producer in producers.iter() {
            let version = *self
                .written_versions
                .get(&(producer, var.clone()))
                .ok_or(LiftError::MissingDfgNode { offset: producer })?;
            snapshot.push((name.clone(), version));
        }
        snapshot.sort();
        snapshot.dedup();

        if let Some(existing) = self.phi_slots.get(&snapshot) {
            return Ok(existing.clone());
        }

        let sources = snapshot
            .iter()
            .map(|(name, version)| {
                Expression::Variable(AstVariable::Versioned {
                    name: name.clone(),
                    version: *version,
                })
            })
            .collect();

        let result = AstVariable::PhiSlot(self.next_phi_slot);
        self.next_phi_slot += 1;
        log::trace!(target: "lift::phi", "{result} merges variable snapshot {snapshot:?}");
        let id = self.fresh_id();
        statements.insert(*phi_cursor, Statement::new(id, StatementKind::Phi {
            result: result.clone(),
            sources,
        }));
        *phi_cursor += 1;
        self.phi_slots.insert(snapshot, result.clone());
        Ok(result)
    }
}
