//! Terminal host for the onboarding wizard.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::bail;
use d2onboard_engine::{
    ArchiveCopyEngine, CopyOptions, ExtractionEngine, NetworkProtocol, detect_source_type,
    scan_for_installations,
};
use d2onboard_extraction::ExtractionSupervisor;
use d2onboard_ledger::{CompletionLedger, JsonFileStore};
use d2onboard_onboarding::{
    Command, ErrorView, HostHandoff, OnboardingController, Pickers, WizardStep,
};
use d2onboard_sources::{
    Credential, DevicePicker, DirBrowser, FilePicker, NetworkTarget, SourceKind, SourceResolver,
    UsbDevice, browse_root, parse_device_records,
};
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::RunArgs;
use crate::config::OnboardConfig;

fn build_engine(config: &OnboardConfig) -> Arc<ArchiveCopyEngine> {
    Arc::new(ArchiveCopyEngine::new(CopyOptions {
        network_mount_root: config.network_mount_root.clone(),
        verify_checksums: config.verify_checksums,
        ..CopyOptions::default()
    }))
}

fn open_ledger(config: &OnboardConfig) -> anyhow::Result<CompletionLedger> {
    let ledger = CompletionLedger::open(JsonFileStore::new(config.ledger_path()))?
        .with_default_asset_dir(config.asset_dir());
    Ok(ledger)
}

/// Runs the wizard. Must be called inside `rt`'s context.
pub fn run(config: &OnboardConfig, args: RunArgs, rt: &Runtime) -> anyhow::Result<()> {
    let engine = build_engine(config);
    let ledger = open_ledger(config)?;
    let root = browse_root(&config.browse_roots, &config.data_dir);
    let resolver = SourceResolver::new(engine.clone(), root)
        .with_filter(config.filter_extension.clone());
    let supervisor = ExtractionSupervisor::new(engine, config.poll_interval());
    let host = Arc::new(LaunchHost::new(config.launch_command.clone()));

    let preset = match (&args.local, &args.usb) {
        (Some(_), _) => Some(SourceKind::Local),
        (None, Some(_)) => Some(SourceKind::Usb),
        (None, None) => None,
    };
    let file: Arc<dyn FilePicker> = match args.local {
        Some(file) => Arc::new(PresetFile(file)),
        None => Arc::new(TerminalFilePicker),
    };
    let device: Arc<dyn DevicePicker> = match args.usb {
        Some(path) => Arc::new(PresetDevice(path)),
        None => Arc::new(TerminalDevicePicker),
    };
    let pickers = Pickers { file, device };

    let mut controller = OnboardingController::new(
        ledger,
        resolver,
        supervisor,
        config.asset_dir(),
        host,
        pickers,
    )?;

    if controller.resume_if_complete() {
        return Ok(());
    }

    match preset {
        Some(kind) => run_preset(&mut controller, kind, rt),
        None => run_interactive(&mut controller, rt),
    }
}

fn run_preset(
    controller: &mut OnboardingController,
    kind: SourceKind,
    rt: &Runtime,
) -> anyhow::Result<()> {
    controller.dispatch(Command::ConfirmWelcome)?;
    controller.dispatch(Command::ChooseSource(kind))?;
    rt.block_on(render_extraction(controller));

    match controller.step() {
        WizardStep::Complete => Ok(()),
        _ => {
            if let Some(view) = controller.error_view() {
                print_error(view);
            }
            bail!("onboarding did not complete")
        }
    }
}

fn run_interactive(controller: &mut OnboardingController, rt: &Runtime) -> anyhow::Result<()> {
    loop {
        match controller.step() {
            WizardStep::Welcome => {
                println!();
                println!("Welcome. Your game files need to be imported before the first start.");
                match prompt("[enter] continue, h help, q quit")?.as_deref() {
                    None | Some("q") => return Ok(()),
                    Some("h") => show_help(controller),
                    Some(_) => {
                        controller.dispatch(Command::ConfirmWelcome)?;
                    }
                }
            }
            WizardStep::ChooseSource => {
                if let Some(message) = controller.inline_error() {
                    println!("! {message}");
                }
                println!();
                println!("Where are your game files?");
                println!("  1) Local files");
                println!("  2) USB storage");
                println!("  3) Network share");
                let command = match prompt("choice (h help, q quit)")?.as_deref() {
                    None | Some("q") => return Ok(()),
                    Some("h") => {
                        show_help(controller);
                        continue;
                    }
                    Some("1") => Command::ChooseSource(SourceKind::Local),
                    Some("2") => Command::ChooseSource(SourceKind::Usb),
                    Some("3") => Command::ChooseSource(SourceKind::Network),
                    Some(other) => {
                        println!("unknown choice: {other}");
                        continue;
                    }
                };
                submit(controller, command);

                if controller.awaiting_credentials() {
                    match prompt_network_target()? {
                        Some(target) => {
                            submit(controller, Command::ConfirmNetworkCredentials(target))
                        }
                        None => return Ok(()),
                    }
                }
            }
            WizardStep::Extracting => {
                rt.block_on(render_extraction(controller));
            }
            WizardStep::Error => {
                if let Some(view) = controller.error_view() {
                    print_error(view);
                }
                match prompt("r retry, h help, q quit")?.as_deref() {
                    None | Some("q") => bail!("onboarding did not complete"),
                    Some("h") => show_help(controller),
                    Some("r") => {
                        controller.dispatch(Command::Retry)?;
                    }
                    Some(other) => println!("unknown choice: {other}"),
                }
            }
            WizardStep::Complete => return Ok(()),
        }
    }
}

/// Dispatches a command whose resolution errors are shown inline.
fn submit(controller: &mut OnboardingController, command: Command) {
    if let Err(e) = controller.dispatch(command) {
        warn!(error = %e, "command failed");
    }
}

async fn render_extraction(controller: &mut OnboardingController) {
    let mut last = (u8::MAX, String::new());
    while controller.step() == WizardStep::Extracting {
        if controller.pump().await.is_none() {
            break;
        }
        let view = controller.progress();
        let current = (view.percent(), view.current_file.clone());
        if current != last {
            println!("[{:>3}%] {}", current.0, current.1);
            last = current;
        }
    }
}

fn print_error(view: &ErrorView) {
    println!();
    println!("{}", view.title);
    println!("{}", view.message);
    for file in &view.missing_files {
        println!("  - {file}");
    }
}

fn show_help(controller: &mut OnboardingController) {
    if controller.dispatch(Command::OpenHelp).is_err() {
        return;
    }
    let help = controller.help();
    println!();
    println!("{}", help.title);
    for section in help.sections {
        println!();
        println!("{}", section.heading);
        println!("  {}", section.body);
    }
}

fn prompt_network_target() -> anyhow::Result<Option<NetworkTarget>> {
    let protocol = loop {
        let Some(answer) = prompt("protocol [SMB/FTP/HTTP] (default SMB)")? else {
            return Ok(None);
        };
        if answer.is_empty() {
            break NetworkProtocol::Smb;
        }
        match answer.parse::<NetworkProtocol>() {
            Ok(protocol) => break protocol,
            Err(e) => println!("{e}"),
        }
    };
    let Some(host) = prompt("host")? else {
        return Ok(None);
    };
    let Some(share) = prompt("share")? else {
        return Ok(None);
    };
    let username = prompt("username (optional)")?.unwrap_or_default();
    let password = prompt("password (optional)")?.unwrap_or_default();

    Ok(Some(NetworkTarget::new(
        protocol,
        host,
        share,
        Credential::new(username, password),
    )))
}

/// Reads one trimmed line from stdin. `None` on end of input.
fn prompt(label: &str) -> io::Result<Option<String>> {
    print!("{label}> ");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

// ---------------------------------------------------------------------------
// Pickers
// ---------------------------------------------------------------------------

struct TerminalFilePicker;

impl FilePicker for TerminalFilePicker {
    fn pick_file(&self, browser: &mut DirBrowser) -> Option<PathBuf> {
        loop {
            let entries = match browser.entries() {
                Ok(entries) => entries,
                Err(e) => {
                    println!("cannot list {}: {e}", browser.current().display());
                    if browser.ascend() {
                        continue;
                    }
                    return None;
                }
            };

            println!();
            println!("{}", browser.current().display());
            println!("  0) ..");
            for (i, entry) in entries.iter().enumerate() {
                let suffix = if entry.is_dir { "/" } else { "" };
                println!("  {}) {}{suffix}", i + 1, entry.name);
            }

            let answer = prompt("number to open or select, q to cancel").ok()??;
            match answer.as_str() {
                "q" => return None,
                "0" | ".." => {
                    if !browser.ascend() {
                        println!("already at the top");
                    }
                }
                other => {
                    let Some(entry) = other
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|i| entries.get(i))
                    else {
                        println!("unknown entry: {other}");
                        continue;
                    };
                    let result = if entry.is_dir {
                        browser.descend(&entry.name).map(|()| None)
                    } else {
                        browser.select(&entry.name).map(Some)
                    };
                    match result {
                        Ok(Some(file)) => return Some(file),
                        Ok(None) => {}
                        Err(e) => println!("{e}"),
                    }
                }
            }
        }
    }
}

struct TerminalDevicePicker;

impl DevicePicker for TerminalDevicePicker {
    fn pick_device(&self, devices: &[UsbDevice]) -> Option<usize> {
        println!();
        for (i, device) in devices.iter().enumerate() {
            println!("  {}) {}", i + 1, describe_device(device));
        }
        let answer = prompt("device number, q to cancel").ok()??;
        answer.parse::<usize>().ok()?.checked_sub(1)
    }
}

/// Selects a fixed file given on the command line.
struct PresetFile(PathBuf);

impl FilePicker for PresetFile {
    fn pick_file(&self, _browser: &mut DirBrowser) -> Option<PathBuf> {
        Some(self.0.clone())
    }
}

/// Selects the device mounted at a path given on the command line.
struct PresetDevice(String);

impl DevicePicker for PresetDevice {
    fn pick_device(&self, devices: &[UsbDevice]) -> Option<usize> {
        let wanted = self.0.trim_end_matches('/');
        let index = devices
            .iter()
            .position(|d| d.path.trim_end_matches('/') == wanted);
        if index.is_none() {
            warn!(path = %self.0, "no USB device mounted at path");
        }
        index
    }
}

// ---------------------------------------------------------------------------
// Host handoff
// ---------------------------------------------------------------------------

/// Announces the asset path and optionally starts the game.
pub struct LaunchHost {
    launch_command: Option<String>,
}

impl LaunchHost {
    pub fn new(launch_command: Option<String>) -> Self {
        Self { launch_command }
    }
}

impl HostHandoff for LaunchHost {
    fn proceed(&self, asset_path: &Path) {
        println!("Assets ready at {}", asset_path.display());

        let Some(command) = self.launch_command.as_deref().filter(|c| !c.trim().is_empty()) else {
            return;
        };
        match std::process::Command::new(command).arg(asset_path).spawn() {
            Ok(child) => info!(command, pid = child.id(), "launched"),
            Err(e) => warn!(command, error = %e, "failed to launch"),
        }
    }
}

// ---------------------------------------------------------------------------
// Other subcommands
// ---------------------------------------------------------------------------

pub fn status(config: &OnboardConfig) -> anyhow::Result<()> {
    let ledger = open_ledger(config)?;
    let record = ledger.record();

    println!("ledger:           {}", config.ledger_path().display());
    println!("complete:         {}", yes_no(record.complete));
    println!(
        "asset path:       {}",
        ledger.asset_path().unwrap_or("-")
    );
    println!(
        "completed at:     {}",
        record
            .completed_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".into())
    );
    println!("needs onboarding: {}", yes_no(ledger.is_first_run()));
    Ok(())
}

pub fn devices(config: &OnboardConfig) {
    let engine = build_engine(config);
    let devices = parse_device_records(&engine.list_usb_devices());
    if devices.is_empty() {
        println!("No USB storage devices found");
        return;
    }
    for device in &devices {
        println!("{}", describe_device(device));
    }
}

pub fn scan(config: &OnboardConfig, paths: Vec<PathBuf>) {
    let paths = if paths.is_empty() {
        config.browse_roots.clone()
    } else {
        for path in &paths {
            println!("{}: {}", path.display(), detect_source_type(path));
        }
        paths
    };

    let installations = scan_for_installations(&paths);
    if installations.is_empty() {
        println!("No installations found");
    }
    for install in installations {
        println!("{}  ({})", install.path.display(), install.version);
    }
}

fn describe_device(device: &UsbDevice) -> String {
    let mut line = format!("{}  {}", device.display_name(), device.path);
    if device.total_space > 0 {
        line.push_str(&format!("  {}", format_bytes(device.total_space)));
    }
    if device.free_space > 0 {
        line.push_str(&format!(" ({} free)", format_bytes(device.free_space)));
    }
    line
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
