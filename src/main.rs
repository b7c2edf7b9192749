mod backend;
mod config;
mod firewall;
mod interfaces;
mod models;
mod provision;
mod resolver;
mod sharing;

use backend::shell::{Privilege, ShellRunner};
use backend::systemd::SystemdServices;
use config::Config;
use gtk4::gdk::Display;
use gtk4::prelude::*;
use gtk4::{
    Align, Application, ApplicationWindow, Button, CheckButton, CssProvider, DropDown, Grid, Label,
    StringObject, gio, glib,
};
use models::{ActionReport, InterfaceKind, Selection, Session};
use provision::Provisioner;
use sharing::SharingController;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const APP_ID: &str = "com.wifishare.app";

fn main() -> glib::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config();

    let app = Application::builder().application_id(APP_ID).build();
    app.connect_activate(move |app| build_ui(app, &config));
    app.run()
}

fn load_config() -> Config {
    let path = Config::default_path();
    match Config::load(&path) {
        Ok(config) => config,
        Err(err) => {
            warn!("{err}. Using default configuration.");
            Config::default()
        }
    }
}

/// Host access shared by the Start and Stop handlers.
struct AppContext {
    runner: ShellRunner,
    services: SystemdServices<ShellRunner>,
    config: Config,
}

impl AppContext {
    fn new(config: Config) -> Self {
        let runner = ShellRunner::new(Privilege::from_config(config.use_sudo));
        let services = SystemdServices::new(config.services.control, runner.clone());
        Self {
            runner,
            services,
            config,
        }
    }

    fn controller(&self) -> SharingController<'_, ShellRunner, SystemdServices<ShellRunner>> {
        SharingController::new(&self.runner, &self.services, &self.config.services)
    }
}

fn build_ui(app: &Application, config: &Config) {
    load_css();

    let window = ApplicationWindow::builder()
        .application(app)
        .title("Wi-Fi to Ethernet Sharing")
        .default_width(400)
        .default_height(200)
        .build();

    window.add_css_class("wifishare-window");

    let context = Rc::new(AppContext::new(config.clone()));
    let session = Rc::new(RefCell::new(Session::default()));

    let wireless = interfaces::enumerate(
        &context.runner,
        &context.config.interfaces,
        InterfaceKind::Wireless,
    );
    let wired = interfaces::enumerate(
        &context.runner,
        &context.config.interfaces,
        InterfaceKind::Wired,
    );

    let widgets = Rc::new(build_grid(&wireless, &wired, &session.borrow().status));

    wire_actions(&widgets, &context, &session);
    spawn_provisioning(context.config.clone(), &widgets);

    window.set_child(Some(&widgets.grid));
    window.present();
}

struct SharingWidgets {
    grid: Grid,
    wifi: DropDown,
    eth: DropDown,
    upnp: CheckButton,
    status: Label,
    start: Button,
    stop: Button,
}

fn build_grid(wireless: &[String], wired: &[String], status: &str) -> SharingWidgets {
    let grid = Grid::new();
    grid.add_css_class("wifishare-panel");
    grid.set_row_spacing(8);
    grid.set_column_spacing(8);
    grid.set_margin_top(12);
    grid.set_margin_bottom(12);
    grid.set_margin_start(12);
    grid.set_margin_end(12);

    let wifi_label = Label::new(Some("Select Wi-Fi Interface:"));
    wifi_label.set_halign(Align::Start);
    let eth_label = Label::new(Some("Select Ethernet Interface:"));
    eth_label.set_halign(Align::Start);
    grid.attach(&wifi_label, 0, 0, 1, 1);
    grid.attach(&eth_label, 0, 1, 1, 1);

    let wifi = build_picker(wireless);
    grid.attach(&wifi, 1, 0, 2, 1);

    let eth = build_picker(wired);
    grid.attach(&eth, 1, 1, 2, 1);

    let upnp = CheckButton::with_label("Enable UPnP (recommended for Xbox)");
    grid.attach(&upnp, 0, 2, 3, 1);

    let status_label = Label::new(Some(status));
    status_label.add_css_class("wifishare-status");
    status_label.set_wrap(true);
    grid.attach(&status_label, 0, 3, 3, 1);

    let start = Button::with_label("Start Sharing");
    start.add_css_class("wifishare-primary");
    grid.attach(&start, 0, 4, 1, 1);

    let stop = Button::with_label("Stop Sharing");
    grid.attach(&stop, 1, 4, 1, 1);

    SharingWidgets {
        grid,
        wifi,
        eth,
        upnp,
        status: status_label,
        start,
        stop,
    }
}

fn build_picker(names: &[String]) -> DropDown {
    let items: Vec<&str> = names.iter().map(String::as_str).collect();
    let picker = DropDown::from_strings(&items);
    picker.set_hexpand(true);
    picker
}

fn selected_name(picker: &DropDown) -> Option<String> {
    picker
        .selected_item()
        .and_downcast::<StringObject>()
        .map(|item| item.string().to_string())
}

fn read_selection(widgets: &SharingWidgets) -> Selection {
    Selection {
        uplink: selected_name(&widgets.wifi),
        downlink: selected_name(&widgets.eth),
        upnp: widgets.upnp.is_active(),
    }
}

#[derive(Clone, Copy, Debug)]
enum SharingAction {
    Start,
    Stop,
}

fn wire_actions(
    widgets: &Rc<SharingWidgets>,
    context: &Rc<AppContext>,
    session: &Rc<RefCell<Session>>,
) {
    for (button, action) in [
        (&widgets.start, SharingAction::Start),
        (&widgets.stop, SharingAction::Stop),
    ] {
        let widgets = widgets.clone();
        let context = context.clone();
        let session = session.clone();
        button.connect_clicked(move |_| run_action(action, &widgets, &context, &session));
    }
}

fn run_action(
    action: SharingAction,
    widgets: &SharingWidgets,
    context: &AppContext,
    session: &RefCell<Session>,
) {
    let mut session = session.borrow_mut();
    session.selection = read_selection(widgets);

    let controller = context.controller();
    let result = match action {
        SharingAction::Start => controller.start(&mut session),
        SharingAction::Stop => controller.stop(&mut session),
    };

    match result {
        Ok(report) => {
            log_failures(&format!("{action:?}"), &report);
            info!(?action, failed = report.failure_count(), "{}", session.status);
        }
        Err(err) => warn!("{action:?} rejected: {err}"),
    }
    widgets.status.set_text(&session.status);
}

fn log_failures(action: &str, report: &ActionReport) {
    for step in report.failures() {
        let detail = step.error.as_deref().unwrap_or_default();
        warn!(step = %step.step, "{action} step failed: {detail}");
    }
}

fn set_actions_sensitive(widgets: &SharingWidgets, sensitive: bool) {
    widgets.start.set_sensitive(sensitive);
    widgets.stop.set_sensitive(sensitive);
}

/// Runs host provisioning off the UI thread; package installs take a while.
fn spawn_provisioning(config: Config, widgets: &Rc<SharingWidgets>) {
    set_actions_sensitive(widgets, false);
    widgets.status.set_text("Status: Preparing gateway...");

    let widgets = widgets.clone();
    glib::spawn_future_local(async move {
        let outcome = gio::spawn_blocking(move || {
            let runner = ShellRunner::new(Privilege::from_config(config.use_sudo));
            let services = SystemdServices::new(config.services.control, runner.clone());
            Provisioner::new(&runner, &services, &config).run()
        })
        .await;

        match outcome {
            Ok(outcome) => {
                log_failures("Provisioning", outcome.report());
                widgets.status.set_text(&outcome.status());
            }
            Err(_) => {
                error!("Provisioning thread panicked");
                widgets.status.set_text("Gateway setup failed unexpectedly.");
            }
        }
        set_actions_sensitive(&widgets, true);
    });
}

fn load_css() {
    let css = r#"
    .wifishare-window {
        background: #2b2b2b;
        color: #e6e6e6;
        font-family: "Cantarell", "Noto Sans", sans-serif;
    }

    .wifishare-panel {
        background: #2f2f2f;
        border-radius: 18px;
        padding: 12px;
    }

    .wifishare-status {
        color: #cfcfcf;
        padding: 6px 4px;
    }

    .wifishare-primary {
        background: #2f7ae5;
        color: #ffffff;
        border-radius: 10px;
        padding: 6px 10px;
    }
    "#;

    let provider = CssProvider::new();
    provider.load_from_data(css);

    if let Some(display) = Display::default() {
        gtk4::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    }
}
