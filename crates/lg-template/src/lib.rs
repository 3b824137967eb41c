//! The template engine for lg contexts.
//!
//! Context files (`*.ctx.md`) and sub-templates (`*.tpl.md`) are markdown
//! with a restricted placeholder language:
//!
//! ```text
//! ${section}  $section            render a section
//! ${tpl:path} ${tpl@origin:path}  include a sub-template
//! ${ctx:path} ${ctx@origin:path}  include a context (minus frontmatter)
//! ${md:path#anchor,param}         include a markdown file literally
//! {% if cond %} … {% elif %} … {% else %} … {% endif %}
//! {% mode set:mode %} … {% endmode %}
//! {# comment #}
//! ```
//!
//! The engine expands depth-first with cycle detection, keeps mode/tag
//! state strictly stack-scoped, and delegates section rendering to a
//! [`SectionHandler`] supplied by the driver.

#![warn(missing_docs)]

mod analysis;
mod engine;
mod error;
mod frontmatter;
mod lexer;
mod node;
mod parser;
mod state;

pub use analysis::{CollectedSections, SectionCollector};
pub use engine::{Expansion, SectionHandler, TemplateEngine};
pub use error::TemplateError;
pub use frontmatter::{Frontmatter, parse_frontmatter};
pub use node::{IncludeKind, ParsedTemplate, TemplateNode};
pub use parser::parse_template;
pub use state::{ActiveState, StateStack};
