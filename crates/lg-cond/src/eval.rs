//! Condition evaluation.

use crate::ast::{Atom, Condition, ScopeKind};
use crate::context::ConditionContext;

/// Evaluates a parsed condition against a context.
pub fn evaluate(cond: &Condition, ctx: &ConditionContext) -> bool {
    match cond {
        Condition::Atom(atom) => evaluate_atom(atom, ctx),
        Condition::Not(inner) => !evaluate(inner, ctx),
        Condition::And(operands) => operands.iter().all(|c| evaluate(c, ctx)),
        Condition::Or(operands) => operands.iter().any(|c| evaluate(c, ctx)),
    }
}

fn evaluate_atom(atom: &Atom, ctx: &ConditionContext) -> bool {
    match atom {
        Atom::Tag(tag) => ctx.active_tags.contains(tag),
        Atom::TagSet { set, tag } => {
            // An unknown or empty set is neutral: the user could not have
            // chosen from it, so the condition holds for every member.
            let Some(members) = ctx.tagsets.get(set) else {
                return true;
            };
            if members.is_empty() {
                return true;
            }
            let any_active = members.iter().any(|m| ctx.active_tags.contains(m));
            if !any_active {
                return true;
            }
            ctx.active_tags.contains(tag)
        }
        Atom::Scope(kind) => match kind {
            ScopeKind::Local => ctx.is_local_scope(),
            ScopeKind::Parent => !ctx.is_local_scope(),
        },
        Atom::Provider(id) => ctx.provider_base.as_deref() == Some(id.as_str()),
    }
}
