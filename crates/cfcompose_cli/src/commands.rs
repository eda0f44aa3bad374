//! Command implementations.
//!
//! Each command writes its report to the given writer; logs go through
//! `tracing`.

use std::io::Write;
use std::path::{Path, PathBuf};

use cfcompose_components::{TemplateRegistry, stacks};
use cfcompose_core::{ConfigError, DeploymentConfig};
use cfcompose_graph::{ComposeError, ComposedStack, Composer, Composition, ExportCollision, ExportLedger};
use cfcompose_model::{ModelError, Template, ValueSource};
use thiserror::Error;

use crate::cli::{Command, InputArgs, TargetArgs};

/// Directory compiled templates go to when neither `--out` nor the config
/// names one.
pub const DEFAULT_OUTPUT_DIR: &str = "build";

/// Errors reported by the command line.
#[derive(Debug, Error)]
pub enum CliError {
    /// Loading or applying the deployment config failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The requested stack is not in the catalogue.
    #[error("unknown stack '{name}', expected one of [{}]", available.join(", "))]
    UnknownStack {
        /// The requested name.
        name: String,
        /// Names in the catalogue.
        available: Vec<&'static str>,
    },

    /// Building a stack failed.
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// Rendering a built stack failed.
    #[error(transparent)]
    Render(#[from] ModelError),

    /// Two stacks publish the same export.
    #[error(transparent)]
    Collision(#[from] ExportCollision),

    /// Writing a compiled template failed.
    #[error("cannot write '{}': {source}", path.display())]
    Write {
        /// The file or directory being written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the report failed.
    #[error("cannot write report: {0}")]
    Report(#[from] std::io::Error),
}

/// Runs `command`, writing its report to `out`.
///
/// # Errors
///
/// See [`CliError`].
pub fn run(command: Command, out: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Build { target, out: dir } => build(&target, dir, out),
        Command::Plan { target } => plan(&target, out),
        Command::Exports { stacks, inputs } => exports(&stacks, &inputs, out),
        Command::List => list(out),
        Command::Schema => {
            writeln!(out, "{}", DeploymentConfig::schema()?)?;
            Ok(())
        }
    }
}

/// Templates available to every command: the built-in leaf templates plus
/// each shipped stack, so stacks can nest one another.
#[must_use]
pub fn registry() -> TemplateRegistry {
    let mut registry = TemplateRegistry::with_builtin();
    for (_, build_stack) in stacks::CATALOGUE {
        registry.register_composition(build_stack());
    }
    registry
}

fn load_config(inputs: &InputArgs) -> Result<DeploymentConfig, CliError> {
    let mut config = match &inputs.config {
        Some(path) => DeploymentConfig::load(path)?,
        None => DeploymentConfig::default(),
    };
    config.overlay_process_env();
    config.assign(inputs.params.iter().map(String::as_str))?;
    Ok(config)
}

fn catalogue_stack(name: &str) -> Result<Composition, CliError> {
    stacks::stack(name).ok_or_else(|| CliError::UnknownStack {
        name: name.to_string(),
        available: stacks::names(),
    })
}

fn composition(name: &str, config: &DeploymentConfig) -> Result<Composition, CliError> {
    let mut composition = catalogue_stack(name)?;
    config.apply_components(&mut composition)?;
    Ok(composition)
}

fn compose(target: &TargetArgs) -> Result<(DeploymentConfig, ComposedStack), CliError> {
    let config = load_config(&target.inputs)?;
    let name = target
        .stack
        .as_deref()
        .or(config.stack.as_deref())
        .unwrap_or(stacks::AMIS);
    let composition = composition(name, &config)?;

    let registry = registry();
    let stack = Composer::new(&registry)
        .with_template_url_prefix(target.template_url_prefix.as_str())
        .build(&composition, &config.overrides())?;
    Ok((config, stack))
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn build(target: &TargetArgs, dir: Option<PathBuf>, out: &mut dyn Write) -> Result<(), CliError> {
    let (config, stack) = compose(target)?;
    let dir = dir
        .or(config.output_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    let files = stack.render_files()?;
    std::fs::create_dir_all(&dir).map_err(|source| CliError::Write {
        path: dir.clone(),
        source,
    })?;
    for (file, json) in &files {
        let path = dir.join(file);
        write_file(&path, json)?;
        tracing::debug!(path = %path.display(), "wrote template");
        writeln!(out, "{}", path.display())?;
    }

    tracing::info!(
        stack = stack.name(),
        files = files.len(),
        dir = %dir.display(),
        "stack written"
    );
    Ok(())
}

fn write_file(path: &Path, json: &str) -> Result<(), CliError> {
    std::fs::write(path, json).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn plan(target: &TargetArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let (_, stack) = compose(target)?;

    writeln!(out, "stack {}", stack.name())?;
    for (index, name) in stack.order().iter().enumerate() {
        let Some(component) = stack.component(name) else {
            continue;
        };
        writeln!(out, "{}. {} ({})", index + 1, name, component.template)?;
        for (parameter, resolved) in component.parameters.iter() {
            let value = resolved
                .value
                .as_str()
                .map_or_else(|| resolved.value.to_string(), str::to_string);
            writeln!(
                out,
                "     {parameter} = {value} [{}]",
                describe_source(&resolved.source)
            )?;
        }
    }
    for export in stack.exports() {
        writeln!(out, "export {} <- {}", export.name, export)?;
    }
    Ok(())
}

fn describe_source(source: &ValueSource) -> String {
    match source {
        ValueSource::Default => "default".to_string(),
        ValueSource::Literal => "literal".to_string(),
        ValueSource::Global => "global".to_string(),
        ValueSource::CompositionParameter { name } => format!("parameter {name}"),
        ValueSource::Output { component, output } => format!("output {component}.{output}"),
    }
}

fn exports(names: &[String], inputs: &InputArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let config = load_config(inputs)?;
    let overrides = config.overrides();
    let registry = registry();

    // Component config applies to the stacks that declare the component; a
    // component none of them declares is still an error.
    let mut compositions = Vec::with_capacity(names.len());
    let mut unmatched: Option<Vec<String>> = None;
    for name in names {
        let mut composition = catalogue_stack(name)?;
        let skipped = config.apply_declared_components(&mut composition)?;
        unmatched = Some(match unmatched {
            Some(previous) => previous.into_iter().filter(|c| skipped.contains(c)).collect(),
            None => skipped,
        });
        compositions.push(composition);
    }
    if let Some(component) = unmatched.into_iter().flatten().next() {
        return Err(ConfigError::UnknownComponent {
            stack: names.join(", "),
            component,
        }
        .into());
    }

    let mut ledger = ExportLedger::new();
    for composition in &compositions {
        let stack = Composer::new(&registry).build(composition, &overrides)?;
        ledger.register_all(stack.exports())?;
    }

    for record in ledger.iter() {
        writeln!(out, "{}\t{}", record.name, record)?;
    }
    tracing::info!(stacks = names.len(), exports = ledger.len(), "no export collisions");
    Ok(())
}

fn list(out: &mut dyn Write) -> Result<(), CliError> {
    writeln!(out, "stacks:")?;
    for name in stacks::names() {
        let description = stacks::stack(name)
            .and_then(|composition| composition.description().map(str::to_string))
            .unwrap_or_default();
        writeln!(out, "  {name:<20} {description}")?;
    }

    let registry = TemplateRegistry::with_builtin();
    writeln!(out, "templates:")?;
    for name in registry.names() {
        let description = registry
            .get(name)
            .map(Template::description)
            .unwrap_or_default();
        writeln!(out, "  {name:<20} {description}")?;
    }
    Ok(())
}
