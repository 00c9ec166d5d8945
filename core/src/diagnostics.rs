//! Minimal runtime diagnostics: the node-stats section of the SIGQUIT-style
//! dump. `rune-runtime` composes this with its own sections (threads, locks,
//! the signal dispatcher) into the full report; this crate only knows about
//! reference-counted node statistics, so that's all it prints on its own.

use crate::memory_stats::node_registry;
use std::io::Write;

/// Write the node-statistics section of a diagnostics dump to `out`.
pub fn write_node_stats(out: &mut impl Write) -> std::io::Result<()> {
    let stats = node_registry().aggregate();
    writeln!(out, "[Nodes]")?;
    writeln!(out, "  Threads tracked: {}", stats.active_threads)?;
    writeln!(out, "  Created: {}", stats.total_created)?;
    writeln!(out, "  Dropped: {}", stats.total_dropped)?;
    writeln!(out, "  Live (approx): {}", stats.live())?;
    if stats.overflow_count > 0 {
        writeln!(
            out,
            "  WARNING: {} thread(s) exceeded the tracked slot table",
            stats.overflow_count
        )?;
    }
    Ok(())
}
