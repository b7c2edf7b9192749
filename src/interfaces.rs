use crate::backend::CommandRunner;
use crate::config::InterfacesConfig;
use crate::models::InterfaceKind;
use tracing::{debug, warn};

pub const LINK_LIST_COMMAND: &str = "ip -o link show";

/// Lists interfaces of `kind` in the order the kernel reports them.
/// A failed listing yields an empty picker.
pub fn enumerate<R: CommandRunner>(
    runner: &R,
    config: &InterfacesConfig,
    kind: InterfaceKind,
) -> Vec<String> {
    let prefixes = match kind {
        InterfaceKind::Wireless => &config.wireless_prefixes,
        InterfaceKind::Wired => &config.wired_prefixes,
    };

    match runner.run(LINK_LIST_COMMAND) {
        Ok(output) => {
            let names = link_names(&output, prefixes.as_slice());
            debug!(kind = kind.label(), ?names, "enumerated interfaces");
            names
        }
        Err(err) => {
            warn!("Listing {} interfaces failed: {err}", kind.label());
            Vec::new()
        }
    }
}

/// Extracts device names from `ip -o link show` output.
///
/// Each line looks like `3: wlp2s0: <BROADCAST,...> mtu 1500 ...`; virtual
/// links carry a peer suffix (`veth1@if4:`) which is dropped.
pub fn link_names<S: AsRef<str>>(output: &str, prefixes: &[S]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for line in output.lines() {
        let Some(field) = line.split_whitespace().nth(1) else {
            continue;
        };
        let name = field.trim_end_matches(':');
        let name = name.split('@').next().unwrap_or(name);

        if name.is_empty() || !prefixes.iter().any(|p| name.starts_with(p.as_ref())) {
            continue;
        }
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    names
}
