//! Command dispatch
//!
//! Every selection-changing command opens a session from the build file,
//! applies one engine operation and writes the build back.

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use itertools::Itertools;
use tracing::{debug, instrument};

use crate::application::services::Session;
use crate::application::ApplicationError;
use crate::cli::args::{Cli, Commands, ConfigCommands, StackCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{expand_path, global_config_path, local_config_path, Settings};
use crate::domain::{NodeStatus, RuleEngine, RuleError};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Completion { shell }) => cmd_completion(*shell),
        Some(Commands::Config { command }) => cmd_config(cli, command),
        Some(command) => {
            let container = ServiceContainer::new(load_settings(cli)?);
            dispatch(&container, command)
        }
        None => {
            Cli::command()
                .print_help()
                .map_err(|e| InfraError::io("print help", e))?;
            Ok(())
        }
    }
}

fn dispatch(container: &ServiceContainer, command: &Commands) -> CliResult<()> {
    match command {
        Commands::Status => cmd_status(container),
        Commands::Buy { id } => mutate(container, |s| {
            s.engine.buy(id)?;
            Ok(format!("acquired {}", describe(&s.engine, id)))
        }),
        Commands::Refund { id } => mutate(container, |s| {
            s.engine.refund(id)?;
            Ok(format!("refunded {}", describe(&s.engine, id)))
        }),
        Commands::Stack { command } => cmd_stack(container, command),
        Commands::Check { id } => cmd_check(container, id),
        Commands::Reset => mutate(container, |s| {
            s.engine.reset();
            Ok("selection cleared".to_string())
        }),
        Commands::Max { points } => mutate(container, |s| {
            s.engine.set_points_max(*points);
            Ok(format!("budget set to {}", s.engine.points_max()))
        }),
        Commands::Export { output } => cmd_export(container, output.as_deref()),
        Commands::Import { file } => cmd_import(container, file),
        Commands::Layout {
            width,
            height,
            json,
        } => cmd_layout(container, *width, *height, *json),
        Commands::Tree => cmd_tree(container),
        Commands::Nodes { available } => cmd_nodes(container, *available),
        Commands::Config { .. } | Commands::Completion { .. } => Err(CliError::Usage(
            "command does not need a dataset".to_string(),
        )),
    }
}

/// Effective settings with command-line overrides applied.
fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let work_dir = resolve_work_dir(cli)?;
    let mut settings = Settings::load(Some(&work_dir))?;
    if let Some(path) = &cli.dataset {
        settings.dataset = expand_path(path);
    }
    if let Some(path) = &cli.build {
        settings.build_file = expand_path(path);
    }
    settings.dataset = anchor(&work_dir, &settings.dataset);
    settings.build_file = anchor(&work_dir, &settings.build_file);
    debug!(?settings, "settings loaded");
    Ok(settings)
}

fn resolve_work_dir(cli: &Cli) -> CliResult<PathBuf> {
    match &cli.work_dir {
        Some(dir) => Ok(expand_path(dir)),
        None => std::env::current_dir()
            .map_err(|e| InfraError::io("resolve working directory", e).into()),
    }
}

/// Relative paths are taken relative to the working directory.
fn anchor(work_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        work_dir.join(path)
    }
}

/// Open the session, apply `op`, save, and report its message.
fn mutate<F>(container: &ServiceContainer, op: F) -> CliResult<()>
where
    F: FnOnce(&mut Session) -> CliResult<String>,
{
    let mut session = container.build_service.open()?;
    let message = op(&mut session)?;
    container.build_service.save(&session)?;
    output::success(&message);
    output::detail(&points_line(&session.engine));
    Ok(())
}

fn describe(engine: &RuleEngine, id: &str) -> String {
    match engine.node(id) {
        Some(node) if node.label != node.id && !node.label.is_empty() => {
            format!("{} ({})", node.label, node.id)
        }
        _ => id.to_string(),
    }
}

fn points_line(engine: &RuleEngine) -> String {
    format!(
        "points: {} / {} ({} left), stage {}",
        engine.points_spent(),
        engine.points_max(),
        engine.points_remaining(),
        engine.stage()
    )
}

#[instrument(skip(container))]
fn cmd_status(container: &ServiceContainer) -> CliResult<()> {
    let session = container.build_service.open()?;
    let engine = &session.engine;

    output::header("Build");
    output::detail(&points_line(engine));
    output::detail(&format!("principle points: {}", engine.principle_points()));

    output::header("Acquired");
    if engine.active().is_empty() {
        output::detail("nothing yet");
    }
    for node in engine.active_nodes() {
        let level = engine.stack_level(&node.id);
        if level > 1 {
            output::detail(&format!("{} x{}", describe(engine, &node.id), level));
        } else {
            output::detail(&describe(engine, &node.id));
        }
    }

    if !engine.stat_totals().is_empty() {
        output::header("Stats");
        for (stat, total) in engine.stat_totals() {
            output::detail(&format!("{}: {}", stat, total));
        }
    }

    let techniques = engine
        .active_nodes()
        .flat_map(|n| n.techniques.iter())
        .map(|t| t.name.as_str())
        .filter(|name| !name.is_empty())
        .unique()
        .collect::<Vec<_>>();
    if !techniques.is_empty() {
        output::header("Techniques");
        for name in techniques {
            output::detail(&name);
        }
    }

    for id in &session.restored.dropped {
        output::warning(&format!("saved node could not be restored: {}", id));
    }
    Ok(())
}

fn cmd_stack(container: &ServiceContainer, command: &StackCommands) -> CliResult<()> {
    match command {
        StackCommands::Buy { id } => mutate(container, |s| {
            let level = s.engine.buy_stack(id)?;
            Ok(format!("{} now at level {}", describe(&s.engine, id), level))
        }),
        StackCommands::Refund { id } => mutate(container, |s| {
            let level = s.engine.refund_stack(id)?;
            Ok(format!("{} now at level {}", describe(&s.engine, id), level))
        }),
    }
}

/// Explain buy/refund eligibility; never fails on rule rejection.
fn cmd_check(container: &ServiceContainer, id: &str) -> CliResult<()> {
    let session = container.build_service.open()?;
    let engine = &session.engine;
    if engine.node(id).is_none() {
        return Err(RuleError::NodeNotFound(id.to_string()).into());
    }

    output::header(&describe(engine, id));
    let report = |label: &str, result: Result<(), RuleError>| match result {
        Ok(()) => output::action(label, "ok"),
        Err(e) => {
            output::action(label, "no");
            output::failure(&format!("{} ({:?})", e, e.kind()));
        }
    };
    if engine.is_stackable(id) {
        output::detail(&format!("stackable, level {}", engine.stack_level(id)));
        report("buy level", engine.can_buy_stack(id));
    } else {
        report("buy", engine.can_buy(id));
    }
    report("refund", engine.can_refund(id));
    Ok(())
}

fn cmd_export(container: &ServiceContainer, target: Option<&Path>) -> CliResult<()> {
    let session = container.build_service.open()?;
    match target {
        Some(path) => {
            container
                .build_service
                .write_payload(path, &session.to_payload())?;
            output::action("Exported", &path.display());
        }
        None => output::info(&container.build_service.export_json(&session)?),
    }
    Ok(())
}

fn cmd_import(container: &ServiceContainer, file: &Path) -> CliResult<()> {
    let mut session = container.build_service.open()?;
    let report = container.build_service.import_file(&mut session, file)?;
    container.build_service.save(&session)?;

    output::success(&format!(
        "imported {} node(s) in {} pass(es)",
        report.restored.len(),
        report.passes
    ));
    for id in &report.dropped {
        output::warning(&format!("dropped {}: requirements not met", id));
    }
    for (id, missing) in &report.stack_shortfall {
        output::warning(&format!("{}: {} stack level(s) not restored", id, missing));
    }
    output::detail(&points_line(&session.engine));
    Ok(())
}

fn cmd_layout(
    container: &ServiceContainer,
    width: Option<f64>,
    height: Option<f64>,
    json: bool,
) -> CliResult<()> {
    let session = container.build_service.open()?;
    let (default_w, default_h) = container.layout_service.canvas();
    let width = width.unwrap_or(default_w);
    let height = height.unwrap_or(default_h);
    if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
        return Err(CliError::InvalidArgs(format!(
            "canvas must be positive, got {}x{}",
            width, height
        )));
    }

    let positions = container.layout_service.positions(&session, width, height);
    if json {
        let rendered = serde_json::to_string_pretty(&positions).map_err(|e| {
            ApplicationError::OperationFailed {
                context: "serialize layout".to_string(),
                source: Box::new(e),
            }
        })?;
        output::info(&rendered);
    } else {
        for node in session.engine.nodes() {
            if let Some(p) = positions.get(&node.id) {
                output::info(&format!("{:<28} {:>9.1} {:>9.1}", node.id, p.x, p.y));
            }
        }
    }
    Ok(())
}

fn cmd_tree(container: &ServiceContainer) -> CliResult<()> {
    let session = container.build_service.open()?;
    output::info(&container.layout_service.tree(&session.engine));
    Ok(())
}

fn cmd_nodes(container: &ServiceContainer, only_available: bool) -> CliResult<()> {
    let session = container.build_service.open()?;
    for line in container.layout_service.node_lines(&session.engine) {
        let (active, available, note) = match &line.status {
            NodeStatus::Active {
                level,
                can_level_up,
            } => {
                let note = match (*level, *can_level_up) {
                    (l, true) => format!("level {}, can level up", l),
                    (l, false) if l > 1 => format!("level {}", l),
                    _ => String::new(),
                };
                (true, false, note)
            }
            NodeStatus::Available => (false, true, String::new()),
            NodeStatus::Locked(reason) => (false, false, reason.to_string()),
        };
        if only_available && !available {
            continue;
        }
        output::info(&format!(
            "{} {:<24} {:<6} {:>3}  {}",
            output::marker(active, available),
            line.id,
            line.group,
            line.cost,
            note
        ));
    }
    Ok(())
}

fn cmd_config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    let work_dir = resolve_work_dir(cli)?;
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Init { global } => {
            let path = if *global {
                global_config_path().ok_or_else(|| {
                    CliError::Usage("cannot determine global config directory".to_string())
                })?
            } else {
                local_config_path(&work_dir)
            };
            if path.exists() {
                return Err(CliError::Usage(format!(
                    "config already exists: {}",
                    path.display()
                )));
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| InfraError::io(format!("create {}", parent.display()), e))?;
            }
            std::fs::write(&path, Settings::template())
                .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
            output::action("Created", &path.display());
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::action("global", &path.display()),
                None => output::action("global", "<unavailable>"),
            }
            output::action("local", &local_config_path(&work_dir).display());
        }
    }
    Ok(())
}

fn cmd_completion(shell: Shell) -> CliResult<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}
