use crate::backend::{BackendError, BackendResult, CommandRunner, ServiceManager};
use crate::config::ServiceControl;
use tracing::{debug, warn};
use zbus::blocking::{Connection, Proxy};
use zbus::zvariant::OwnedObjectPath;

pub mod systemd_consts {
    pub const BUS_NAME: &str = "org.freedesktop.systemd1";
    pub const OBJECT_PATH: &str = "/org/freedesktop/systemd1";
    pub const MANAGER_INTERFACE: &str = "org.freedesktop.systemd1.Manager";
    pub const JOB_MODE_REPLACE: &str = "replace";
}

/// Maps a bare service name (`dnsmasq`) to its unit name (`dnsmasq.service`).
pub fn unit_name(service: &str) -> String {
    if service.contains('.') {
        service.to_string()
    } else {
        format!("{service}.service")
    }
}

/// Talks to the systemd manager over the system bus.
pub struct SystemdBus;

impl SystemdBus {
    pub fn start_unit(&self, unit: &str) -> BackendResult<()> {
        self.job("StartUnit", unit)
    }

    pub fn stop_unit(&self, unit: &str) -> BackendResult<()> {
        self.job("StopUnit", unit)
    }

    pub fn restart_unit(&self, unit: &str) -> BackendResult<()> {
        self.job("RestartUnit", unit)
    }

    pub fn enable_unit(&self, unit: &str) -> BackendResult<()> {
        let conn = system_bus()?;
        let manager = manager_proxy(&conn)?;
        let (_carries_install_info, changes): (bool, Vec<(String, String, String)>) = manager
            .call("EnableUnitFiles", &(vec![unit], false, true))
            .map_err(|e| bus_error("EnableUnitFiles", unit, e))?;
        debug!(unit, changes = changes.len(), "enabled unit files");

        manager
            .call_method("Reload", &())
            .map(|_| ())
            .map_err(|e| bus_error("Reload", unit, e))
    }

    fn job(&self, method: &str, unit: &str) -> BackendResult<()> {
        let conn = system_bus()?;
        let manager = manager_proxy(&conn)?;
        let job: OwnedObjectPath = manager
            .call(method, &(unit, systemd_consts::JOB_MODE_REPLACE))
            .map_err(|e| bus_error(method, unit, e))?;
        debug!(method, unit, job = job.as_str(), "queued systemd job");
        Ok(())
    }
}

/// Service control through `systemctl`, run by a [`CommandRunner`].
pub struct Systemctl<R> {
    runner: R,
}

impl<R: CommandRunner> Systemctl<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn call(&self, verb: &str, service: &str) -> BackendResult<()> {
        self.runner
            .run(&format!("systemctl {verb} {service}"))
            .map(|_| ())
    }
}

/// Uses D-Bus where allowed by `control`, `systemctl` otherwise.
pub struct SystemdServices<R> {
    control: ServiceControl,
    bus: SystemdBus,
    systemctl: Systemctl<R>,
}

impl<R: CommandRunner> SystemdServices<R> {
    pub fn new(control: ServiceControl, runner: R) -> Self {
        Self {
            control,
            bus: SystemdBus,
            systemctl: Systemctl::new(runner),
        }
    }

    fn dispatch(
        &self,
        verb: &str,
        service: &str,
        via_bus: fn(&SystemdBus, &str) -> BackendResult<()>,
    ) -> BackendResult<()> {
        match self.control {
            ServiceControl::Systemctl => self.systemctl.call(verb, service),
            ServiceControl::Dbus => via_bus(&self.bus, &unit_name(service)),
            ServiceControl::Auto => match via_bus(&self.bus, &unit_name(service)) {
                Err(err @ (BackendError::Unavailable(_) | BackendError::PermissionDenied(_))) => {
                    warn!("systemd D-Bus {verb} of {service} failed: {err}. Falling back to systemctl.");
                    self.systemctl.call(verb, service)
                }
                other => other,
            },
        }
    }
}

impl<R: CommandRunner> ServiceManager for SystemdServices<R> {
    fn start(&self, service: &str) -> BackendResult<()> {
        self.dispatch("start", service, SystemdBus::start_unit)
    }

    fn stop(&self, service: &str) -> BackendResult<()> {
        self.dispatch("stop", service, SystemdBus::stop_unit)
    }

    fn restart(&self, service: &str) -> BackendResult<()> {
        self.dispatch("restart", service, SystemdBus::restart_unit)
    }

    fn enable(&self, service: &str) -> BackendResult<()> {
        self.dispatch("enable", service, SystemdBus::enable_unit)
    }
}

fn system_bus() -> BackendResult<Connection> {
    Connection::system().map_err(|e| BackendError::Unavailable(e.to_string()))
}

fn manager_proxy(conn: &Connection) -> BackendResult<Proxy<'_>> {
    Proxy::new(
        conn,
        systemd_consts::BUS_NAME,
        systemd_consts::OBJECT_PATH,
        systemd_consts::MANAGER_INTERFACE,
    )
    .map_err(|e| BackendError::Unavailable(e.to_string()))
}

fn bus_error(method: &str, unit: &str, err: zbus::Error) -> BackendError {
    match &err {
        zbus::Error::MethodError(name, detail, _) => {
            let detail = detail.clone().unwrap_or_default();
            match name.as_str() {
                "org.freedesktop.DBus.Error.AccessDenied"
                | "org.freedesktop.DBus.Error.InteractiveAuthorizationRequired" => {
                    BackendError::PermissionDenied(format!("{method} {unit}: {detail}"))
                }
                "org.freedesktop.DBus.Error.ServiceUnknown" => BackendError::Unavailable(detail),
                other => BackendError::Command {
                    command: format!("{method} {unit}"),
                    detail: format!("{other}: {detail}"),
                },
            }
        }
        _ => BackendError::Unavailable(err.to_string()),
    }
}
