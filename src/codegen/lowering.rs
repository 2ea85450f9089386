use std::collections::BTreeSet;

use crate::lang::command::ArithOp;
use crate::lang::segment::Segment;

/// How one instruction kind is turned into target code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lowering {
    /// The full sequence is repeated at every use.
    Inline,
    /// The sequence is emitted once and reached by an indirect jump.
    Subroutine,
}

/// Which single-cell push/pop primitives the generator uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackForm {
    /// Update SP and address the cell in one instruction (`AM=M+1`).
    /// Unary ops rewrite the top cell in place.
    Combined,
    /// Address the cell and update SP in separate steps.
    /// Unary ops pop, transform and push.
    Split,
}

// =============================================================================
// ROUTINE - instruction kinds that have a shared-subroutine body
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Routine {
    PushLocal,
    PushArgument,
    PushThis,
    PushThat,
    PopLocal,
    PopArgument,
    PopThis,
    PopThat,
    Add,
    Sub,
    Eq,
    Lt,
    Gt,
    And,
    Or,
    Call,
    Return,
}

impl Routine {
    /// Every routine, in library order.
    pub const ALL: [Routine; 17] = [
        Routine::PushLocal,
        Routine::PushArgument,
        Routine::PushThis,
        Routine::PushThat,
        Routine::PopLocal,
        Routine::PopArgument,
        Routine::PopThis,
        Routine::PopThat,
        Routine::Add,
        Routine::Sub,
        Routine::Eq,
        Routine::Lt,
        Routine::Gt,
        Routine::And,
        Routine::Or,
        Routine::Call,
        Routine::Return,
    ];

    /// Looks a routine up by its label without the `$`, e.g. `push.local`.
    pub fn parse(name: &str) -> Option<Routine> {
        Routine::ALL.into_iter().find(|routine| routine.name() == name)
    }

    pub fn name(self) -> &'static str {
        &self.label()[1..]
    }

    pub fn for_push(segment: Segment) -> Option<Routine> {
        Some(match segment {
            Segment::Local => Routine::PushLocal,
            Segment::Argument => Routine::PushArgument,
            Segment::This => Routine::PushThis,
            Segment::That => Routine::PushThat,
            _ => return None,
        })
    }

    pub fn for_pop(segment: Segment) -> Option<Routine> {
        Some(match segment {
            Segment::Local => Routine::PopLocal,
            Segment::Argument => Routine::PopArgument,
            Segment::This => Routine::PopThis,
            Segment::That => Routine::PopThat,
            _ => return None,
        })
    }

    /// `neg` and `not` are short enough that they never get a routine.
    pub fn for_arithmetic(op: ArithOp) -> Option<Routine> {
        Some(match op {
            ArithOp::Add => Routine::Add,
            ArithOp::Sub => Routine::Sub,
            ArithOp::Eq => Routine::Eq,
            ArithOp::Lt => Routine::Lt,
            ArithOp::Gt => Routine::Gt,
            ArithOp::And => Routine::And,
            ArithOp::Or => Routine::Or,
            ArithOp::Neg | ArithOp::Not => return None,
        })
    }

    /// Entry label. The `$` prefix keeps routines out of the namespace of
    /// VM functions, which never start with `$`.
    pub fn label(self) -> &'static str {
        match self {
            Routine::PushLocal => "$push.local",
            Routine::PushArgument => "$push.argument",
            Routine::PushThis => "$push.this",
            Routine::PushThat => "$push.that",
            Routine::PopLocal => "$pop.local",
            Routine::PopArgument => "$pop.argument",
            Routine::PopThis => "$pop.this",
            Routine::PopThat => "$pop.that",
            Routine::Add => "$add",
            Routine::Sub => "$sub",
            Routine::Eq => "$eq",
            Routine::Lt => "$lt",
            Routine::Gt => "$gt",
            Routine::And => "$and",
            Routine::Or => "$or",
            Routine::Call => "$call",
            Routine::Return => "$return",
        }
    }
}

// =============================================================================
// POLICY
// =============================================================================

/// Per-kind lowering table. Fixed for a whole translation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweringPolicy {
    shared: BTreeSet<Routine>,
}

impl LoweringPolicy {
    /// Everything inline: fastest, largest output.
    pub fn inline() -> Self {
        Self {
            shared: BTreeSet::new(),
        }
    }

    /// Every eligible kind through its shared routine: smallest output.
    pub fn shared() -> Self {
        Self {
            shared: Routine::ALL.into_iter().collect(),
        }
    }

    pub fn with(mut self, routine: Routine, lowering: Lowering) -> Self {
        match lowering {
            Lowering::Inline => self.shared.remove(&routine),
            Lowering::Subroutine => self.shared.insert(routine),
        };
        self
    }

    pub fn lowering(&self, routine: Routine) -> Lowering {
        if self.shared.contains(&routine) {
            Lowering::Subroutine
        } else {
            Lowering::Inline
        }
    }

    /// Routines the library must contain, in library order.
    pub fn shared_routines(&self) -> impl Iterator<Item = Routine> + '_ {
        self.shared.iter().copied()
    }
}

impl Default for LoweringPolicy {
    fn default() -> Self {
        Self::shared()
    }
}

/// Code generator configuration, passed once at construction.
#[derive(Debug, Clone)]
pub struct GenConfig {
    pub lowering: LoweringPolicy,
    pub stack_form: StackForm,
    /// Echo VM commands and ROM addresses as comments.
    pub annotate: bool,
}

impl Default for GenConfig {
    fn default() -> Self {
        GenConfig {
            lowering: LoweringPolicy::default(),
            stack_form: StackForm::Combined,
            annotate: false,
        }
    }
}
