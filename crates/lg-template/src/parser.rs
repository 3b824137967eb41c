//! Template parser.
//!
//! Builds the block tree from the token stream. Placeholders are
//! classified here: `tpl:`/`ctx:`/`md:` prefixes (with optional `@origin`)
//! become includes, everything else is a section reference.

use crate::lexer::{Token, lex};
use crate::node::{IncludeKind, ParsedTemplate, TemplateNode};

/// An open block on the parser stack.
enum OpenBlock {
    If {
        /// Completed branches.
        branches: Vec<(String, Vec<TemplateNode>)>,
        /// Condition of the branch currently being filled.
        current_condition: Option<String>,
        /// Whether the current branch is the `else`.
        in_else: bool,
        /// Body of the current branch.
        body: Vec<TemplateNode>,
    },
    Mode {
        /// Mode-set id.
        set: String,
        /// Mode id.
        mode: String,
        /// Block body.
        body: Vec<TemplateNode>,
    },
}

/// Classifies a placeholder into a node.
fn placeholder_node(inner: &str) -> TemplateNode {
    for (prefix, kind) in [
        ("tpl", IncludeKind::Template),
        ("ctx", IncludeKind::Context),
        ("md", IncludeKind::Markdown),
    ] {
        // `tpl:path` or `tpl@origin:path`.
        if let Some(rest) = inner.strip_prefix(prefix) {
            if let Some(reference) = rest.strip_prefix(':') {
                return TemplateNode::Include {
                    kind,
                    reference: reference.to_string(),
                };
            }
            if rest.starts_with('@') {
                return TemplateNode::Include {
                    kind,
                    reference: rest.to_string(),
                };
            }
        }
    }
    TemplateNode::Section(inner.to_string())
}

/// Parses template source into a node tree.
///
/// Unclosed blocks at end of input are auto-closed and counted; the caller
/// decides whether that is fatal (top level) or a warning (nested include).
pub fn parse_template(source: &str) -> Result<ParsedTemplate, String> {
    let tokens = lex(source)?;

    let mut root: Vec<TemplateNode> = Vec::new();
    let mut stack: Vec<OpenBlock> = Vec::new();

    let push_node = |node: TemplateNode, stack: &mut Vec<OpenBlock>, root: &mut Vec<TemplateNode>| {
        match stack.last_mut() {
            Some(OpenBlock::If { body, .. }) | Some(OpenBlock::Mode { body, .. }) => {
                body.push(node);
            }
            None => root.push(node),
        }
    };

    for token in tokens {
        match token {
            Token::Text(text) => push_node(TemplateNode::Text(text), &mut stack, &mut root),
            Token::Placeholder(inner) => {
                push_node(placeholder_node(&inner), &mut stack, &mut root);
            }
            Token::BlockTag(tag) => {
                if let Some(condition) = tag.strip_prefix("if ") {
                    stack.push(OpenBlock::If {
                        branches: Vec::new(),
                        current_condition: Some(condition.trim().to_string()),
                        in_else: false,
                        body: Vec::new(),
                    });
                } else if let Some(condition) = tag.strip_prefix("elif ") {
                    match stack.last_mut() {
                        Some(OpenBlock::If {
                            branches,
                            current_condition,
                            in_else,
                            body,
                        }) => {
                            if *in_else {
                                return Err("elif after else".to_string());
                            }
                            let finished = current_condition
                                .take()
                                .expect("if block always has a current condition");
                            branches.push((finished, std::mem::take(body)));
                            *current_condition = Some(condition.trim().to_string());
                        }
                        _ => return Err("elif outside of if block".to_string()),
                    }
                } else if tag == "else" {
                    match stack.last_mut() {
                        Some(OpenBlock::If {
                            branches,
                            current_condition,
                            in_else,
                            body,
                        }) => {
                            if *in_else {
                                return Err("duplicate else".to_string());
                            }
                            let finished = current_condition
                                .take()
                                .expect("if block always has a current condition");
                            branches.push((finished, std::mem::take(body)));
                            *in_else = true;
                        }
                        _ => return Err("else outside of if block".to_string()),
                    }
                } else if tag == "endif" {
                    match stack.pop() {
                        Some(OpenBlock::If {
                            mut branches,
                            current_condition,
                            in_else,
                            body,
                        }) => {
                            let else_body = if in_else {
                                Some(body)
                            } else {
                                let finished = current_condition
                                    .expect("if block always has a current condition");
                                branches.push((finished, body));
                                None
                            };
                            push_node(
                                TemplateNode::If {
                                    branches,
                                    else_body,
                                },
                                &mut stack,
                                &mut root,
                            );
                        }
                        _ => return Err("endif without if".to_string()),
                    }
                } else if let Some(spec) = tag.strip_prefix("mode ") {
                    let Some((set, mode)) = spec.trim().split_once(':') else {
                        return Err(format!("mode tag needs set:mode, got '{spec}'"));
                    };
                    stack.push(OpenBlock::Mode {
                        set: set.trim().to_string(),
                        mode: mode.trim().to_string(),
                        body: Vec::new(),
                    });
                } else if tag == "endmode" {
                    match stack.pop() {
                        Some(OpenBlock::Mode { set, mode, body }) => {
                            push_node(
                                TemplateNode::Mode { set, mode, body },
                                &mut stack,
                                &mut root,
                            );
                        }
                        _ => return Err("endmode without mode".to_string()),
                    }
                } else {
                    return Err(format!("unknown block tag '{tag}'"));
                }
            }
        }
    }

    // Auto-close whatever is still open, innermost first.
    let unclosed_blocks = stack.len();
    while let Some(open) = stack.pop() {
        let node = match open {
            OpenBlock::If {
                mut branches,
                current_condition,
                in_else,
                body,
            } => {
                let else_body = if in_else {
                    Some(body)
                } else {
                    branches.push((
                        current_condition.expect("if block always has a current condition"),
                        body,
                    ));
                    None
                };
                TemplateNode::If {
                    branches,
                    else_body,
                }
            }
            OpenBlock::Mode { set, mode, body } => TemplateNode::Mode { set, mode, body },
        };
        match stack.last_mut() {
            Some(OpenBlock::If { body, .. }) | Some(OpenBlock::Mode { body, .. }) => {
                body.push(node);
            }
            None => root.push(node),
        }
    }

    Ok(ParsedTemplate {
        nodes: root,
        unclosed_blocks,
    })
}
