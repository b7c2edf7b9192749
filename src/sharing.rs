use crate::backend::{CommandRunner, ServiceManager};
use crate::config::ServicesConfig;
use crate::firewall::{RuleOp, forwarding_command, is_valid_interface_name, sharing_rules};
use crate::models::{ActionReport, ActiveShare, Session, SharingState};
use tracing::info;

pub const STARTED_WITH_UPNP_STATUS: &str = "Internet sharing started with UPnP enabled.";
pub const STARTED_WITHOUT_UPNP_STATUS: &str = "Internet sharing started without UPnP.";
pub const STOPPED_STATUS: &str = "Internet sharing stopped.";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SharingError {
    #[error("Please select both interfaces.")]
    MissingSelection,

    #[error("Invalid interface name: {0}")]
    InvalidInterface(String),

    #[error("Internet sharing is already active.")]
    AlreadySharing,

    #[error("Internet sharing is not active.")]
    NotSharing,
}

/// Applies and removes the NAT setup between the selected interfaces.
///
/// Both actions leave their outcome in `session.status`. Rejected actions run
/// no commands at all.
pub struct SharingController<'a, R, S> {
    runner: &'a R,
    services: &'a S,
    units: &'a ServicesConfig,
}

impl<'a, R: CommandRunner, S: ServiceManager> SharingController<'a, R, S> {
    pub fn new(runner: &'a R, services: &'a S, units: &'a ServicesConfig) -> Self {
        Self {
            runner,
            services,
            units,
        }
    }

    pub fn start(&self, session: &mut Session) -> Result<ActionReport, SharingError> {
        let result = self.try_start(session);
        session.status = match &result {
            Ok(report) if session.selection.upnp => report.annotate(STARTED_WITH_UPNP_STATUS),
            Ok(report) => report.annotate(STARTED_WITHOUT_UPNP_STATUS),
            Err(err) => err.to_string(),
        };
        result
    }

    pub fn stop(&self, session: &mut Session) -> Result<ActionReport, SharingError> {
        let result = self.try_stop(session);
        session.status = match &result {
            Ok(report) => report.annotate(STOPPED_STATUS),
            Err(err) => err.to_string(),
        };
        result
    }

    fn try_start(&self, session: &mut Session) -> Result<ActionReport, SharingError> {
        let (uplink, downlink) = session
            .selection
            .both()
            .ok_or(SharingError::MissingSelection)?;

        for name in [uplink, downlink] {
            if !is_valid_interface_name(name) {
                return Err(SharingError::InvalidInterface(name.to_string()));
            }
        }

        if session.state.is_sharing() {
            return Err(SharingError::AlreadySharing);
        }

        let upnp = session.selection.upnp;
        info!(uplink, downlink, upnp, "Starting internet sharing");

        let mut report = ActionReport::default();
        self.command(&mut report, &forwarding_command(true));

        let rules = sharing_rules(uplink, downlink);
        for rule in &rules {
            self.command(&mut report, &rule.command(RuleOp::Append));
        }

        let dhcp = &self.units.dhcp;
        report.record(format!("start {dhcp}"), self.services.start(dhcp));
        if upnp {
            let upnp_unit = &self.units.upnp;
            report.record(format!("start {upnp_unit}"), self.services.start(upnp_unit));
        }

        session.state = SharingState::Sharing(ActiveShare {
            uplink: uplink.to_string(),
            downlink: downlink.to_string(),
            upnp,
            rules,
        });
        Ok(report)
    }

    fn try_stop(&self, session: &mut Session) -> Result<ActionReport, SharingError> {
        let (uplink, downlink) = session
            .selection
            .both()
            .ok_or(SharingError::MissingSelection)?;

        let SharingState::Sharing(active) = &session.state else {
            return Err(SharingError::NotSharing);
        };

        if active.uplink != uplink || active.downlink != downlink {
            info!(
                "Selection changed since start; removing rules for {} -> {}",
                active.uplink, active.downlink
            );
        }
        info!(
            uplink = %active.uplink,
            downlink = %active.downlink,
            upnp = active.upnp,
            "Stopping internet sharing"
        );

        let mut report = ActionReport::default();
        self.command(&mut report, &forwarding_command(false));

        for rule in active.rules.iter().rev() {
            self.command(&mut report, &rule.command(RuleOp::Delete));
        }

        let dhcp = &self.units.dhcp;
        report.record(format!("stop {dhcp}"), self.services.stop(dhcp));
        let upnp = &self.units.upnp;
        report.record(format!("stop {upnp}"), self.services.stop(upnp));

        session.state = SharingState::Idle;
        Ok(report)
    }

    fn command(&self, report: &mut ActionReport, command: &str) {
        info!("Running {command}");
        report.record(command, self.runner.run(command).map(|_| ()));
    }
}
