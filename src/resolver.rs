use crate::backend::CommandRunner;
use tracing::{debug, warn};

pub const PORT_53_LISTENERS_COMMAND: &str = "lsof -i :53";

/// True when `resolver` holds port 53. lsof exits non-zero when nothing
/// matches, so a failed listing counts as no conflict.
pub fn port_53_conflict<R: CommandRunner>(runner: &R, resolver: &str) -> bool {
    match runner.run(PORT_53_LISTENERS_COMMAND) {
        Ok(output) => {
            let conflict = holds_port(&output, resolver);
            if conflict {
                warn!("{resolver} is listening on port 53");
            }
            conflict
        }
        Err(err) => {
            debug!("No port 53 listeners reported: {err}");
            false
        }
    }
}

fn holds_port(listing: &str, resolver: &str) -> bool {
    !resolver.is_empty() && listing.lines().any(|line| line.contains(resolver))
}
