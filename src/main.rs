//! arbor-ci CLI - inspect the Arbor regression-test CI configuration
//!
//! Lists the site catalog, resolves variants, validates the settings and
//! renders build plans.

use anyhow::Context;
use arbor_ci::config::{CliArgs, Commands, HarnessSettings, OutputFormat};
use arbor_ci::logging;
use arbor_ci::plan::BuildPlan;
use arbor_ci::site::SystemPartition;
use arbor_ci::validate::validate;
use arbor_ci::variant::{resolve, resolve_named, ResolveTarget, ResolvedVariant, VariantRegistry};
use clap::Parser;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Handle result
    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(args: &CliArgs, settings: &HarnessSettings) -> anyhow::Result<()> {
    if let Some(dir) = &args.log_dir {
        logging::install(&settings.logging_config, dir)
            .with_context(|| format!("installing log sinks under {}", dir.display()))?;
        return Ok(());
    }

    let default = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn run(args: CliArgs) -> anyhow::Result<()> {
    let settings = HarnessSettings::from_cli(&args).context("loading settings")?;
    init_logging(&args, &settings)?;

    match &args.config {
        Some(path) => info!("Using settings from {}", path.display()),
        None => info!("Using built-in settings"),
    }

    let registry = VariantRegistry::arbor().context("building the variant registry")?;
    info!("{} variants registered", registry.len());

    handle_command(&args.command, &settings, &registry)
}

fn handle_command(
    command: &Commands,
    settings: &HarnessSettings,
    registry: &VariantRegistry,
) -> anyhow::Result<()> {
    match command {
        Commands::Systems { format } => cmd_systems(settings, *format),
        Commands::Resolve { system, environ, format } => {
            cmd_resolve(settings, registry, system, environ, *format)
        }
        Commands::Validate => cmd_validate(settings, registry),
        Commands::ShowConfig => {
            println!("{}", settings.to_json()?);
            Ok(())
        }
        Commands::Detect { hostname } => cmd_detect(settings, hostname.as_deref()),
        Commands::Plan { variant, system, environ } => {
            cmd_plan(settings, registry, variant, system, environ)
        }
        Commands::Sanity { variant, output } => cmd_sanity(registry, variant, output),
    }
}

fn parse_target(settings: &HarnessSettings, system: &str, environ: &str) -> anyhow::Result<ResolveTarget> {
    let system: SystemPartition = system.parse()?;
    if !settings.site_configuration.systems.contains(&system) {
        warn!("{} is not in the site catalog", system);
    }
    Ok(ResolveTarget::new(system, environ))
}

fn cmd_systems(settings: &HarnessSettings, format: OutputFormat) -> anyhow::Result<()> {
    let site = &settings.site_configuration;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(site)?);
        return Ok(());
    }

    settings.print_summary();

    println!("\n=== Systems ===");
    for (name, cluster) in site.systems.sites() {
        println!("{} - {}", name, cluster.descr);
        if !cluster.hostnames.is_empty() {
            println!("  Hostnames:      {}", cluster.hostnames.join(", "));
        }
        println!("  Modules system: {:?}", cluster.modules_system);
        for (pname, partition) in &cluster.partitions {
            println!("  {}:{} ({})", name, pname, partition.descr);
            println!("    Scheduler: {}", partition.scheduler);
            println!("    Environs:  {}", partition.environs.join(", "));
            if !partition.modules.is_empty() {
                println!("    Modules:   {}", partition.modules.join(", "));
            }
            if let Some(max_jobs) = partition.max_jobs {
                println!("    Max jobs:  {}", max_jobs);
            }
        }
    }

    println!("\n=== Environments ===");
    for (scope, name, environ) in site.environments.entries() {
        let ftn = environ.ftn.as_deref().unwrap_or("-");
        println!(
            "[{}] {}: cc={} cxx={} ftn={}",
            scope, name, environ.cc, environ.cxx, ftn
        );
    }
    Ok(())
}

fn print_resolved(variant: &ResolvedVariant) {
    println!("{}", variant.name);
    println!("  Flags:      {}", variant.build_flags.join(" "));
    println!("  Modules:    {}", variant.modules.join(", "));
    println!("  Prebuild:   {}", variant.prebuild_cmd.join(" && "));
    println!("  Build:      {}", variant.build_cmd);
    println!("  Executable: {}", variant.executable);
    println!("  Sanity:     {}", variant.sanity_patterns);
    let tags: Vec<&str> = variant.tags.iter().map(String::as_str).collect();
    println!("  Tags:       {}", tags.join(", "));
}

fn cmd_resolve(
    settings: &HarnessSettings,
    registry: &VariantRegistry,
    system: &str,
    environ: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let target = parse_target(settings, system, environ)?;
    let resolved = resolve(registry, &target);
    info!("{} variants apply to {}", resolved.len(), target);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resolved)?),
        OutputFormat::Text => {
            if resolved.is_empty() {
                println!("No variants apply to {}", target);
            }
            for variant in &resolved {
                print_resolved(variant);
            }
        }
    }
    Ok(())
}

fn cmd_validate(settings: &HarnessSettings, registry: &VariantRegistry) -> anyhow::Result<()> {
    let report = validate(settings, registry);

    println!("{}", report.message);
    for violation in &report.violations {
        println!("  - {}", violation);
    }

    if !report.passed {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_detect(settings: &HarnessSettings, hostname: Option<&str>) -> anyhow::Result<()> {
    let hostname = match hostname {
        Some(h) => h.to_string(),
        None => hostname::get()
            .context("reading the host name")?
            .to_string_lossy()
            .to_string(),
    };

    match settings.site_configuration.systems.detect(&hostname) {
        Some((name, site)) => {
            println!("{} -> {} ({})", hostname, name, site.descr);
            Ok(())
        }
        None => {
            println!("{} does not match any site", hostname);
            std::process::exit(1);
        }
    }
}

fn cmd_plan(
    settings: &HarnessSettings,
    registry: &VariantRegistry,
    variant: &str,
    system: &str,
    environ: &str,
) -> anyhow::Result<()> {
    let target = parse_target(settings, system, environ)?;
    let resolved = resolve_named(registry, variant, &target)?;
    let plan = BuildPlan::new(&settings.site_configuration, &resolved)?;
    print!("{}", plan.render_script());
    Ok(())
}

fn cmd_sanity(registry: &VariantRegistry, variant: &str, output: &Path) -> anyhow::Result<()> {
    let predicate = registry.require(variant)?.sanity_patterns();
    let captured = std::fs::read_to_string(output)
        .with_context(|| format!("reading {}", output.display()))?;

    let outcome = predicate.evaluate(&captured);
    println!("{}: {}", variant, outcome.message);

    if !outcome.passed {
        std::process::exit(1);
    }
    Ok(())
}
