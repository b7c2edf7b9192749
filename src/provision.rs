//! One-shot host setup run at startup: packages, dnsmasq config, forwarding,
//! baseline firewall accepts and service enablement.

use crate::backend::{BackendError, CommandRunner, ServiceManager};
use crate::config::Config;
use crate::firewall::{RuleOp, baseline_input_rules, forwarding_command};
use crate::models::ActionReport;
use crate::resolver::port_53_conflict;
use tracing::{info, warn};

pub const PORT_CONFLICT_STATUS: &str =
    "Port 53 conflict detected. Please resolve it before proceeding.";
pub const CONFIG_WRITE_STATUS: &str = "Error creating dnsmasq configuration file.";
pub const READY_STATUS: &str = "Status: Idle";

#[derive(Debug)]
pub enum ProvisionOutcome {
    /// Stopped after package installation; nothing else touched.
    PortConflict { report: ActionReport },
    /// Stopped because the dnsmasq file could not be written.
    ConfigWriteFailed {
        report: ActionReport,
        error: BackendError,
    },
    Completed { report: ActionReport },
}

impl ProvisionOutcome {
    pub fn report(&self) -> &ActionReport {
        match self {
            ProvisionOutcome::PortConflict { report }
            | ProvisionOutcome::ConfigWriteFailed { report, .. }
            | ProvisionOutcome::Completed { report } => report,
        }
    }

    pub fn status(&self) -> String {
        match self {
            ProvisionOutcome::PortConflict { .. } => PORT_CONFLICT_STATUS.to_string(),
            ProvisionOutcome::ConfigWriteFailed { error, .. } => {
                format!("{CONFIG_WRITE_STATUS} {error}")
            }
            ProvisionOutcome::Completed { report } => report.annotate(READY_STATUS),
        }
    }
}

pub struct Provisioner<'a, R, S> {
    runner: &'a R,
    services: &'a S,
    config: &'a Config,
}

impl<'a, R: CommandRunner, S: ServiceManager> Provisioner<'a, R, S> {
    pub fn new(runner: &'a R, services: &'a S, config: &'a Config) -> Self {
        Self {
            runner,
            services,
            config,
        }
    }

    pub fn run(&self) -> ProvisionOutcome {
        let mut report = ActionReport::default();

        self.install_packages(&mut report);

        if port_53_conflict(self.runner, &self.config.conflict.resolver) {
            warn!("Provisioning stopped: port 53 is taken");
            return ProvisionOutcome::PortConflict { report };
        }

        let dhcp = &self.config.dhcp;
        if let Err(error) = self.runner.write_file(&dhcp.config_path, &dhcp.render()) {
            warn!("Provisioning stopped: {error}");
            return ProvisionOutcome::ConfigWriteFailed { report, error };
        }
        info!("Wrote {}", dhcp.config_path.display());
        self.command(&mut report, &dhcp.test_command());

        self.command(&mut report, &forwarding_command(true));

        for rule in baseline_input_rules() {
            self.command(&mut report, &rule.command(RuleOp::Append));
        }

        for service in [&self.config.services.dhcp, &self.config.services.upnp] {
            report.record(format!("restart {service}"), self.services.restart(service));
            report.record(format!("enable {service}"), self.services.enable(service));
        }

        info!(
            steps = report.steps.len(),
            failed = report.failure_count(),
            "Provisioning finished"
        );
        ProvisionOutcome::Completed { report }
    }

    fn install_packages(&self, report: &mut ActionReport) {
        self.command(report, "apt-get update");
        let packages = &self.config.packages.install;
        if !packages.is_empty() {
            self.command(report, &format!("apt-get install -y {}", packages.join(" ")));
        }
    }

    fn command(&self, report: &mut ActionReport, command: &str) {
        info!("Running {command}");
        report.record(command, self.runner.run(command).map(|_| ()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{RecordingRunner, RecordingServices};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    const RESOLVED_ON_53: &str = "\
COMMAND   PID            USER   FD   TYPE DEVICE SIZE/OFF NODE NAME
systemd-r 612 systemd-resolve   13u  IPv4  21877      0t0  UDP localhost:domain";

    #[test]
    fn full_run_issues_every_step_in_order() {
        let runner = RecordingRunner::new();
        let services = RecordingServices::new();
        let config = Config::default();

        let outcome = Provisioner::new(&runner, &services, &config).run();

        assert!(matches!(outcome, ProvisionOutcome::Completed { .. }));
        assert_eq!(outcome.status(), "Status: Idle");
        assert_eq!(
            runner.commands(),
            vec![
                "apt-get update",
                "apt-get install -y dnsmasq iptables miniupnpd",
                "lsof -i :53",
                "dnsmasq --test --conf-file=/etc/dnsmasq.conf",
                "echo 1 > /proc/sys/net/ipv4/ip_forward",
                "iptables -A INPUT -p udp --dport 67:68 --sport 67:68 -j ACCEPT",
                "iptables -A INPUT -p tcp --dport 53 -j ACCEPT",
                "iptables -A INPUT -p udp --dport 53 -j ACCEPT",
            ]
        );
        assert_eq!(
            runner.writes(),
            vec![(
                PathBuf::from("/etc/dnsmasq.conf"),
                "interface=eth0\ndhcp-range=192.168.137.2,192.168.137.50,255.255.255.0,12h\n"
                    .to_string()
            )]
        );
        assert_eq!(
            services.calls(),
            vec![
                "restart dnsmasq",
                "enable dnsmasq",
                "restart miniupnpd",
                "enable miniupnpd",
            ]
        );
    }

    #[test]
    fn port_conflict_stops_before_touching_the_network() {
        let runner = RecordingRunner::new();
        runner.respond("lsof", RESOLVED_ON_53);
        let services = RecordingServices::new();
        let config = Config::default();

        let outcome = Provisioner::new(&runner, &services, &config).run();

        assert!(matches!(outcome, ProvisionOutcome::PortConflict { .. }));
        assert_eq!(outcome.status(), PORT_CONFLICT_STATUS);
        assert_eq!(
            runner.commands(),
            vec![
                "apt-get update",
                "apt-get install -y dnsmasq iptables miniupnpd",
                "lsof -i :53",
            ]
        );
        assert!(runner.writes().is_empty());
        assert!(services.calls().is_empty());
    }

    #[test]
    fn unwritable_config_stops_provisioning() {
        let runner = RecordingRunner::new();
        runner.fail_writes();
        let services = RecordingServices::new();
        let config = Config::default();

        let outcome = Provisioner::new(&runner, &services, &config).run();

        assert!(matches!(outcome, ProvisionOutcome::ConfigWriteFailed { .. }));
        let status = outcome.status();
        assert!(status.starts_with(CONFIG_WRITE_STATUS), "status was: {status}");
        assert!(status.contains("Permission denied"), "status was: {status}");
        assert_eq!(runner.commands().last().map(String::as_str), Some("lsof -i :53"));
        assert!(services.calls().is_empty());
    }

    #[test]
    fn failed_steps_are_reported_but_do_not_stop_the_run() {
        let runner = RecordingRunner::new();
        runner.fail("apt-get update", "Could not resolve 'archive.ubuntu.com'");
        runner.fail("dnsmasq --test", "bad option at line 1");
        let services = RecordingServices::new();
        services.fail("enable miniupnpd");
        let config = Config::default();

        let outcome = Provisioner::new(&runner, &services, &config).run();

        let failed: Vec<&str> = outcome
            .report()
            .failures()
            .map(|step| step.step.as_str())
            .collect();
        assert_eq!(
            failed,
            vec![
                "apt-get update",
                "dnsmasq --test --conf-file=/etc/dnsmasq.conf",
                "enable miniupnpd",
            ]
        );
        assert_eq!(outcome.status(), "Status: Idle (3 step(s) failed).");
        assert_eq!(services.calls().len(), 4);
    }

    #[test]
    fn custom_config_path_is_the_one_validated() {
        let runner = RecordingRunner::new();
        let services = RecordingServices::new();
        let mut config = Config::default();
        config.dhcp.config_path = PathBuf::from("/etc/dnsmasq.d/wifishare.conf");

        Provisioner::new(&runner, &services, &config).run();

        assert_eq!(
            runner.writes().first().map(|(path, _)| path.clone()),
            Some(PathBuf::from("/etc/dnsmasq.d/wifishare.conf"))
        );
        let validate: Vec<String> = runner
            .commands()
            .into_iter()
            .filter(|c| c.starts_with("dnsmasq"))
            .collect();
        assert_eq!(
            validate,
            vec!["dnsmasq --test --conf-file=/etc/dnsmasq.d/wifishare.conf"]
        );
    }

    #[test]
    fn empty_package_list_skips_install() {
        let runner = RecordingRunner::new();
        let services = RecordingServices::new();
        let mut config = Config::default();
        config.packages.install.clear();

        Provisioner::new(&runner, &services, &config).run();

        assert!(!runner.commands().iter().any(|c| c.starts_with("apt-get install")));
    }
}
