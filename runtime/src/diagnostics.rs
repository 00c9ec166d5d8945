//! The full diagnostics dump: node stats (from `rune-core`) plus this
//! crate's own thread-registry, signal-dispatcher, and lock-graph sections.
//! An embedder wires this to whatever it wants — a `SIGQUIT`/`SIGUSR1`
//! handler, an admin HTTP endpoint, a CLI flag — this module only knows how
//! to render the report, not when to trigger it.

use crate::signal;
use crate::thread_state;
use std::io::Write;

pub fn write_full_report(out: &mut impl Write) -> std::io::Result<()> {
    rune_core::diagnostics::write_node_stats(out)?;
    write_thread_section(out)?;
    write_signal_section(out)?;
    Ok(())
}

fn write_thread_section(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "[Threads]")?;
    match thread_state::snapshot() {
        Some(threads) => {
            writeln!(out, "  Live threads: {}", threads.len())?;
            for t in threads {
                writeln!(out, "    thread {} holding {} lock(s)", t.thread_id, t.held_locks)?;
            }
        }
        None => writeln!(out, "  (registry lock held, skipped)")?,
    }
    Ok(())
}

fn write_signal_section(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "[Signals]")?;
    writeln!(out, "  Dispatcher running: {}", signal::is_running())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_report_contains_every_section() {
        let mut buf = Vec::new();
        write_full_report(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("[Nodes]"));
        assert!(text.contains("[Threads]"));
        assert!(text.contains("[Signals]"));
    }
}
