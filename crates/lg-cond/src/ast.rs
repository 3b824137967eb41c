//! Condition AST.

/// Which scope a `scope:` atom tests for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// The section lives in the scope that owns the current template.
    Local,
    /// The section was reached across a scope boundary.
    Parent,
}

/// A leaf test in a condition expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    /// `tag:T`: true when the tag is active.
    Tag(String),
    /// `TAGSET:S:T`: neutral-true when nothing from set `S` was chosen,
    /// otherwise true when `T` is among the active members.
    TagSet {
        /// Tag-set id.
        set: String,
        /// Tag id within the set.
        tag: String,
    },
    /// `scope:local` / `scope:parent`.
    Scope(ScopeKind),
    /// `provider:X`: true when `X` equals the normalised provider base id.
    Provider(String),
}

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// A leaf test.
    Atom(Atom),
    /// Logical negation.
    Not(Box<Condition>),
    /// Conjunction of two or more operands.
    And(Vec<Condition>),
    /// Disjunction of two or more operands.
    Or(Vec<Condition>),
}

impl Condition {
    /// Builds an AND node, collapsing the single-operand case.
    pub fn and(mut operands: Vec<Condition>) -> Self {
        if operands.len() == 1 {
            operands.remove(0)
        } else {
            Self::And(operands)
        }
    }

    /// Builds an OR node, collapsing the single-operand case.
    pub fn or(mut operands: Vec<Condition>) -> Self {
        if operands.len() == 1 {
            operands.remove(0)
        } else {
            Self::Or(operands)
        }
    }
}
