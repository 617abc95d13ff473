//! Lifts a completed control-flow graph (CFG) and data-flow graph (DFG) over a decoded
//! instruction stream into a single graph-shaped SSA AST.
//!
//! This crate does not decode raw bytes, and does not construct the input CFG/DFG itself —
//! those are the responsibility of an upstream disassembler and analysis pipeline. What it does
//! is the hard part in between: given a CFG whose nodes already own instruction lists, and a DFG
//! describing how values flow between those instructions (across an abstract operand stack and
//! named variables), it rewrites every basic block's instructions into [ast::Statement]s and
//! [ast::Expression]s, threading SSA versioning and φ-node insertion through block boundaries
//! while preserving the CFG's topology and region structure exactly.
//!
//! See [lift::lift] for the entry point.

mod ast;
mod cfg;
mod config;
mod dfg;
mod error;
mod graph;
mod isa;
mod lift;

pub use ast::{AstIsa, AstVariable, Expression, Statement, StatementKind};
pub use cfg::{BasicRegion, Cfg, CfgEdge, CfgNode, EdgeKind, ExceptionHandlerRegion, Region, RegionId};
pub use config::LifterOptions;
pub use dfg::{Dfg, DfgNode, ExternalDataSourceNode, StackDependencies, StackProducer, VariableDependencies};
pub use error::LiftError;
pub use graph::{NodeId, SubGraph};
pub use isa::{Isa, Variable};
pub use lift::lift;

pub(crate) type FxHashMap<K, V> = std::collections::HashMap<K, V, rustc_hash::FxBuildHasher>;
pub(crate) type FxHashSet<K> = std::collections::HashSet<K, rustc_hash::FxBuildHasher>;
/// A deterministically-ordered map (insertion order), used wherever the spec calls out
/// indeterminate hash-iteration order as a pitfall to avoid (see the "Enumeration order of
/// variable dependencies" design note).
pub(crate) type OrderedMap<K, V> = indexmap::IndexMap<K, V, rustc_hash::FxBuildHasher>;
/// A deterministically-ordered set (insertion order), used for the same reason as [OrderedMap].
pub(crate) type OrderedSet<K> = indexmap::IndexSet<K, rustc_hash::FxBuildHasher>;
