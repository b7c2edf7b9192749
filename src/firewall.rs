//! iptables rules and the kernel forwarding switch.

pub const IP_FORWARD_PATH: &str = "/proc/sys/net/ipv4/ip_forward";

/// Longest interface name the kernel accepts (IFNAMSIZ minus the NUL).
const MAX_IFNAME_LEN: usize = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleOp {
    Append,
    Delete,
}

impl RuleOp {
    fn flag(self) -> &'static str {
        match self {
            RuleOp::Append => "-A",
            RuleOp::Delete => "-D",
        }
    }
}

/// One iptables rule, independent of whether it is being added or removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    table: Option<&'static str>,
    chain: &'static str,
    args: Vec<String>,
}

impl Rule {
    fn new(table: Option<&'static str>, chain: &'static str, args: &[&str]) -> Self {
        Self {
            table,
            chain,
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Rewrites traffic leaving `uplink` to the uplink's address.
    pub fn masquerade(uplink: &str) -> Self {
        Self::new(Some("nat"), "POSTROUTING", &["-o", uplink, "-j", "MASQUERADE"])
    }

    /// Lets replies from `uplink` back into `downlink`.
    pub fn forward_established(uplink: &str, downlink: &str) -> Self {
        Self::new(
            None,
            "FORWARD",
            &[
                "-i",
                uplink,
                "-o",
                downlink,
                "-m",
                "state",
                "--state",
                "RELATED,ESTABLISHED",
                "-j",
                "ACCEPT",
            ],
        )
    }

    /// Lets new connections from `downlink` out through `uplink`.
    pub fn forward_outbound(downlink: &str, uplink: &str) -> Self {
        Self::new(
            None,
            "FORWARD",
            &["-i", downlink, "-o", uplink, "-j", "ACCEPT"],
        )
    }

    pub fn command(&self, op: RuleOp) -> String {
        let mut parts = vec!["iptables"];
        if let Some(table) = self.table {
            parts.extend(["-t", table]);
        }
        parts.extend([op.flag(), self.chain]);
        parts.extend(self.args.iter().map(String::as_str));
        parts.join(" ")
    }
}

/// The three rules that share `uplink` with `downlink`, in insertion order.
pub fn sharing_rules(uplink: &str, downlink: &str) -> Vec<Rule> {
    vec![
        Rule::masquerade(uplink),
        Rule::forward_established(uplink, downlink),
        Rule::forward_outbound(downlink, uplink),
    ]
}

/// INPUT accepts for DHCP and DNS on every interface.
pub fn baseline_input_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            None,
            "INPUT",
            &["-p", "udp", "--dport", "67:68", "--sport", "67:68", "-j", "ACCEPT"],
        ),
        Rule::new(None, "INPUT", &["-p", "tcp", "--dport", "53", "-j", "ACCEPT"]),
        Rule::new(None, "INPUT", &["-p", "udp", "--dport", "53", "-j", "ACCEPT"]),
    ]
}

pub fn forwarding_command(enabled: bool) -> String {
    let value = if enabled { 1 } else { 0 };
    format!("echo {value} > {IP_FORWARD_PATH}")
}

/// Interface names end up inside shell commands, so only plain kernel names pass.
pub fn is_valid_interface_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_IFNAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
