//! Log output for the CLI.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_tree::HierarchicalLayer;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "warn,strata_synth=info,stratac=info";

/// Install a hierarchical stderr logger. Per-query work is logged inside
/// its `synthesize` span.
///
/// `RUST_LOG` overrides the default filter, e.g.
/// `RUST_LOG=strata_synth=debug` to see every rejected candidate. Safe to
/// call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            HierarchicalLayer::new(2)
                .with_writer(std::io::stderr)
                .with_targets(false)
                .with_indent_lines(true),
        )
        .try_init();
}
