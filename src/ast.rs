//! The output of lifting: statements and expressions in SSA form, plus the decorator that lets
//! the ISA abstraction (see [crate::Isa]) be queried uniformly over lifted statements.

use compact_str::CompactString;

use crate::isa::{Isa, Variable};

/// A name in the lifted AST's value space.
///
/// Four flavors, matching the four kinds of name the lifter ever mints or references:
///
/// * [AstVariable::External] - a named value entering from outside the analyzed code, taken
///   verbatim from an [crate::ExternalDataSourceNode]'s name.
/// * [AstVariable::StackSlot] - the `N`-th value ever pushed onto the operand stack during this
///   lift run.
/// * [AstVariable::PhiSlot] - the `N`-th φ-result ever synthesized during this lift run.
/// * [AstVariable::Versioned] - the `K`-th definition of a source-level variable named `name`.
///
/// `StackSlot`/`PhiSlot` carry a counter rather than an opaque id because the counter *is* their
/// identity: it is minted once, ascending, and never reused, so two slots/phis are the same iff
/// their counters are equal. `Versioned` identifies a variable by `(name, version)`  - this
/// assumes distinct source variables reaching a single [crate::lift] call have distinct
/// [crate::Variable::name]s, which holds for the usual case of names being the variable's storage
/// location (a local slot index, a register number, ...) rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AstVariable {
    External(CompactString),
    StackSlot(u64),
    PhiSlot(u64),
    Versioned { name: CompactString, version: u32 },
}

/// Lets [AstVariable] itself stand in as the `Variable` of [AstIsa] - an [AstIsa]'s writes/reads
/// are already [AstVariable]s, so the decorator's `Isa::Variable` is `AstVariable`, not whatever
/// `Variable` the wrapped ISA used.
///
/// `name` doesn't have to be unique (see [crate::isa::Variable]'s contract) - `StackSlot`/`PhiSlot`
/// report their family rather than their counter, since the counter isn't text without an
/// allocation this trait's `&str` return can't own. Uniqueness is carried by `Eq`/`Hash` instead.
impl Variable for AstVariable {
    fn name(&self) -> &str {
        match self {
            Self::External(name) => name.as_str(),
            Self::StackSlot(_) => "stack_slot",
            Self::PhiSlot(_) => "phi",
            Self::Versioned { name, .. } => name.as_str(),
        }
    }
}

impl std::fmt::Display for AstVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::External(name) => f.write_str(name),
            Self::StackSlot(n) => write!(f, "stack_slot_{n}"),
            Self::PhiSlot(n) => write!(f, "phi_{n}"),
            Self::Versioned { name, version } => write!(f, "{name}_v{version}"),
        }
    }
}

/// An expression in the lifted AST.
///
/// There is no general-purpose literal/constant variant here: by the time lifting runs, constants
/// are just instructions like any other (an ISA's "push constant" opcode is an [I] like any
/// other), so the only two shapes an expression ever takes are "the result of evaluating an
/// instruction with these already-resolved arguments" and "a reference to a previously-bound
/// name".
#[derive(Debug, Clone)]
pub enum Expression<I> {
    /// The result of evaluating `instruction` (originally at `offset`) with `arguments` already
    /// resolved to SSA-named values.
    Instruction {
        offset: i64,
        instruction: I,
        arguments: Vec<Expression<I>>,
    },
    /// A reference to a previously-bound name.
    Variable(AstVariable),
}

impl<I> Expression<I> {
    /// The instruction this expression evaluates, if it is an [Expression::Instruction].
    pub fn instruction(&self) -> Option<&I> {
        match self {
            Self::Instruction { instruction, .. } => Some(instruction),
            Self::Variable(_) => None,
        }
    }

    pub fn arguments(&self) -> &[Expression<I>] {
        match self {
            Self::Instruction { arguments, .. } => arguments,
            Self::Variable(_) => &[],
        }
    }

    /// The [AstVariable] this expression references, if it is an [Expression::Variable].
    pub fn as_variable(&self) -> Option<&AstVariable> {
        match self {
            Self::Variable(var) => Some(var),
            Self::Instruction { .. } => None,
        }
    }
}

/// A statement of the lifted AST, owned by the basic block it was lifted into.
#[derive(Debug, Clone)]
pub struct Statement<I> {
    /// This statement's position identity: the original instruction's offset for
    /// instruction-backed statements, or a freshly minted, monotonically-descending synthetic id
    /// for [StatementKind::Phi] (which has no instruction of its own). See
    /// [crate::LifterOptions::fresh_id_start].
    position: i64,
    kind: StatementKind<I>,
}

#[derive(Debug, Clone)]
pub enum StatementKind<I> {
    /// A pure side-effect statement: `expr` is evaluated and its result discarded.
    Expression(Expression<I>),
    /// `expr` is evaluated and its results bound to `targets`, in order.
    Assignment {
        targets: Vec<AstVariable>,
        value: Expression<I>,
    },
    /// An SSA merge: `result` takes on whichever of `sources` corresponds to the predecessor edge
    /// actually taken at runtime.
    Phi {
        result: AstVariable,
        sources: Vec<Expression<I>>,
    },
}

impl<I> Statement<I> {
    pub(crate) fn new(position: i64, kind: StatementKind<I>) -> Self {
        Self { position, kind }
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn kind(&self) -> &StatementKind<I> {
        &self.kind
    }

    /// The targets this statement assigns, i.e. the [AstVariable]s it defines.
    ///
    /// Empty for [StatementKind::Expression]; exactly one element for [StatementKind::Phi].
    pub fn targets(&self) -> Vec<&AstVariable> {
        match &self.kind {
            StatementKind::Expression(_) => Vec::new(),
            StatementKind::Assignment { targets, .. } => targets.iter().collect(),
            StatementKind::Phi { result, .. } => vec![result],
        }
    }

    /// Every [AstVariable] referenced anywhere in this statement's expression(s), in the order
    /// they appear.
    pub fn referenced_variables(&self) -> Vec<&AstVariable> {
        fn collect_from<'a, I>(expr: &'a Expression<I>, out: &mut Vec<&'a AstVariable>) {
            match expr {
                Expression::Variable(var) => out.push(var),
                Expression::Instruction { arguments, .. } => {
                    for arg in arguments {
                        collect_from(arg, out);
                    }
                }
            }
        }

        let mut out = Vec::new();
        match &self.kind {
            StatementKind::Expression(expr) => collect_from(expr, &mut out),
            StatementKind::Assignment { value, .. } => collect_from(value, &mut out),
            StatementKind::Phi { sources, .. } => {
                for source in sources {
                    collect_from(source, &mut out);
                }
            }
        }
        out
    }
}

/// Adapts [Isa] to operate on lifted [Statement]s rather than raw instructions.
///
/// For an instruction-backed statement ([StatementKind::Expression] or
/// [StatementKind::Assignment]), offset/push-count/pop-count queries delegate to the wrapped ISA
/// applied to the original instruction; written/read variables are read directly off the
/// statement's own `targets`/referenced-expression structure, since that *is* the AST's record of
/// what it defines and uses; there is no need to round-trip back through the original ISA's
/// notion of variables; the statement already names them with [AstVariable]s. For
/// [StatementKind::Phi], every query reports the synthetic, variable-free shape a φ-node has: no
/// stack effect, one write (its result), and its sources as the things it reads.
pub struct AstIsa<Base> {
    inner: Base,
}

impl<Base> AstIsa<Base> {
    pub fn new(inner: Base) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> Base {
        self.inner
    }
}

impl<I, Base> Isa<Statement<I>> for AstIsa<Base>
where
    Base: Isa<I>,
{
    type Variable = AstVariable;

    fn offset(&self, statement: &Statement<I>) -> i64 {
        statement.position
    }

    fn stack_push_count(&self, statement: &Statement<I>) -> usize {
        match &statement.kind {
            StatementKind::Assignment { value, .. } => match value.instruction() {
                Some(instruction) => self.inner.stack_push_count(instruction),
                None => 0,
            },
            StatementKind::Expression(_) | StatementKind::Phi { .. } => 0,
        }
    }

    fn stack_pop_count(&self, statement: &Statement<I>) -> usize {
        match &statement.kind {
            StatementKind::Assignment { value, .. } | StatementKind::Expression(value) => {
                match value.instruction() {
                    Some(instruction) => self.inner.stack_pop_count(instruction),
                    None => 0,
                }
            }
            StatementKind::Phi { .. } => 0,
        }
    }

    fn written_variables(&self, statement: &Statement<I>) -> Vec<AstVariable> {
        statement.targets().into_iter().cloned().collect()
    }

    fn read_variables(&self, statement: &Statement<I>) -> Vec<AstVariable> {
        statement.referenced_variables().into_iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An instruction that carries nothing but its own push/pop shape - [DummyIsa] answers
    /// offset/push/pop queries by looking it up, the same split used by `FakeIsa` in
    /// `lift/tests.rs`.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct DummyInstr {
        offset: i64,
        push: usize,
        pop: usize,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct DummyVar(&'static str);

    impl Variable for DummyVar {
        fn name(&self) -> &str {
            self.0
        }
    }

    struct DummyIsa;

    impl Isa<DummyInstr> for DummyIsa {
        type Variable = DummyVar;

        fn offset(&self, instruction: &DummyInstr) -> i64 {
            instruction.offset
        }

        fn stack_push_count(&self, instruction: &DummyInstr) -> usize {
            instruction.push
        }

        fn stack_pop_count(&self, instruction: &DummyInstr) -> usize {
            instruction.pop
        }

        fn written_variables(&self, _instruction: &DummyInstr) -> Vec<DummyVar> {
            Vec::new()
        }

        fn read_variables(&self, _instruction: &DummyInstr) -> Vec<DummyVar> {
            Vec::new()
        }
    }

    fn instruction_expr(offset: i64, push: usize, pop: usize, arguments: Vec<Expression<DummyInstr>>) -> Expression<DummyInstr> {
        Expression::Instruction {
            offset,
            instruction: DummyInstr { offset, push, pop },
            arguments,
        }
    }

    /// An [StatementKind::Assignment] delegates push/pop to the wrapped instruction, and reports
    /// its own `targets`/referenced variables rather than the wrapped ISA's.
    #[test]
    fn assignment_delegates_stack_effect_and_reports_own_variables() {
        let isa = AstIsa::new(DummyIsa);
        let arg = AstVariable::StackSlot(0);
        let statement = Statement::new(
            5,
            StatementKind::Assignment {
                targets: vec![AstVariable::StackSlot(1), AstVariable::Versioned { name: "x".into(), version: 0 }],
                value: instruction_expr(5, 2, 1, vec![Expression::Variable(arg.clone())]),
            },
        );

        assert_eq!(isa.offset(&statement), 5);
        assert_eq!(isa.stack_push_count(&statement), 2);
        assert_eq!(isa.stack_pop_count(&statement), 1);
        assert_eq!(
            isa.written_variables(&statement),
            vec![AstVariable::StackSlot(1), AstVariable::Versioned { name: "x".into(), version: 0 }]
        );
        assert_eq!(isa.read_variables(&statement), vec![arg]);
    }

    /// A bare [StatementKind::Expression] still delegates pop count (the instruction still
    /// consumes stack inputs) but never reports a push count or any written variables - its
    /// result, if any, is discarded.
    #[test]
    fn expression_statement_has_no_push_or_writes() {
        let isa = AstIsa::new(DummyIsa);
        let arg = AstVariable::StackSlot(2);
        let statement = Statement::new(6, StatementKind::Expression(instruction_expr(6, 0, 1, vec![Expression::Variable(arg.clone())])));

        assert_eq!(isa.stack_push_count(&statement), 0);
        assert_eq!(isa.stack_pop_count(&statement), 1);
        assert!(isa.written_variables(&statement).is_empty());
        assert_eq!(isa.read_variables(&statement), vec![arg]);
    }

    /// A [StatementKind::Phi] has no stack effect at all; its one write is its result, and its
    /// reads are exactly its merge sources.
    #[test]
    fn phi_statement_has_no_stack_effect() {
        let isa = AstIsa::new(DummyIsa);
        let result = AstVariable::PhiSlot(0);
        let sources = vec![
            AstVariable::Versioned { name: "y".into(), version: 0 },
            AstVariable::Versioned { name: "y".into(), version: 1 },
        ];
        let statement = Statement::new(
            -1,
            StatementKind::Phi {
                result: result.clone(),
                sources: sources.iter().cloned().map(Expression::Variable).collect(),
            },
        );

        assert_eq!(isa.stack_push_count(&statement), 0);
        assert_eq!(isa.stack_pop_count(&statement), 0);
        assert_eq!(isa.written_variables(&statement), vec![result]);
        assert_eq!(isa.read_variables(&statement), sources);
    }
}
