//! The passthrough adapter.

use lg_config::Options;

use crate::adapter::{Adapter, AdapterContext, BoundAdapter, Meta};

/// Fallback adapter for extensions nothing else claims: emits the raw text
/// unchanged.
#[derive(Debug, Default)]
pub struct BaseAdapter;

impl Adapter for BaseAdapter {
    fn name(&self) -> &'static str {
        "base"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[]
    }

    fn bind(&self, _options: &Options) -> Box<dyn BoundAdapter> {
        Box::new(BoundBase)
    }
}

struct BoundBase;

impl BoundAdapter for BoundBase {
    fn process(&self, ctx: &AdapterContext<'_>) -> (String, Meta) {
        (ctx.raw_text.to_string(), Meta::new())
    }
}
