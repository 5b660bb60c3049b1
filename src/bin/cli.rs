use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use iacguard::config::{Config, CONFIG_FILE};
use iacguard::error::ScanError;
use iacguard::output::OutputFormat;
use iacguard::rules::{RuleEngine, Severity};
use iacguard::ScanOptions;

#[derive(Parser)]
#[command(
    name = "iacguard",
    about = "Security scanner for infrastructure-as-code templates",
    version,
    author
)]
struct Cli {
    /// Log debug details to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory of templates for security issues
    Scan {
        /// Path to the template directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Config file path
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output format (console, json, sarif)
        #[arg(long, short = 'f', default_value = "console")]
        format: String,

        /// Minimum severity to fail (info, low, medium, high, critical)
        #[arg(long)]
        fail_on: Option<String>,

        /// Skip files whose path contains this substring (repeatable)
        #[arg(long, short = 'e')]
        exclude: Vec<String>,

        /// Only run this rule (repeatable)
        #[arg(long, short = 'r')]
        rule: Vec<String>,

        /// Write output to file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Run a single rule and print its result
    Check {
        /// Rule id, e.g. TF-EC2-001
        rule_id: String,

        /// Path to the template directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Config file path
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Skip files whose path contains this substring (repeatable)
        #[arg(long, short = 'e')]
        exclude: Vec<String>,
    },

    /// List all available rules
    ListRules {
        /// Output format (table, json)
        #[arg(long, short = 'f', default_value = "table")]
        format: String,
    },

    /// Generate a starter .iacguard.toml config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Scan {
            path,
            config,
            format,
            fail_on,
            exclude,
            rule,
            output,
        } => cmd_scan(path, config, format, fail_on, exclude, rule, output),
        Commands::Check {
            rule_id,
            path,
            config,
            exclude,
        } => cmd_check(rule_id, path, config, exclude),
        Commands::ListRules { format } => cmd_list_rules(format),
        Commands::Init { force } => cmd_init(force),
    };

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_scan(
    path: PathBuf,
    config: Option<PathBuf>,
    format_str: String,
    fail_on_str: Option<String>,
    exclude: Vec<String>,
    rules: Vec<String>,
    output_path: Option<PathBuf>,
) -> Result<i32, ScanError> {
    let format = OutputFormat::from_str_lenient(&format_str).unwrap_or_else(|| {
        eprintln!("Warning: unknown format '{}', using console", format_str);
        OutputFormat::Console
    });

    let fail_on = fail_on_str.and_then(|s| {
        let sev = Severity::from_str_lenient(&s);
        if sev.is_none() {
            eprintln!("Warning: unknown severity '{}', using config default", s);
        }
        sev
    });

    let engine = RuleEngine::new();
    for id in &rules {
        if engine.get(id).is_none() {
            return Err(engine.unknown_rule(id));
        }
    }

    let options = ScanOptions {
        config_path: config,
        format,
        fail_on_override: fail_on,
        exclude,
        rules,
    };

    let report = iacguard::scan(&path, &options)?;
    let rendered = iacguard::render_report(&report, format)?;

    match output_path {
        Some(out) => std::fs::write(&out, &rendered)?,
        None => print!("{}", rendered),
    }

    // Exit code: 0 = pass, 1 = findings above threshold
    Ok(if report.verdict.pass { 0 } else { 1 })
}

fn cmd_check(
    rule_id: String,
    path: PathBuf,
    config: Option<PathBuf>,
    exclude: Vec<String>,
) -> Result<i32, ScanError> {
    let options = ScanOptions {
        config_path: config,
        exclude,
        ..ScanOptions::default()
    };
    let result = iacguard::check(&path, &rule_id, &options)?;
    println!("{} {}: {}", result.status, result.rule_id, result.message);
    for finding in &result.findings {
        println!(
            "  {}.{}: {} {} ({})",
            finding.resource_type,
            finding.identifier,
            finding.entity,
            finding.reason,
            finding.location()
        );
    }

    Ok(if result.is_open() { 1 } else { 0 })
}

fn cmd_list_rules(format_str: String) -> Result<i32, ScanError> {
    let engine = RuleEngine::new();
    let rules = engine.list_rules();

    match format_str.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&rules)?;
            println!("{}", json);
        }
        _ => {
            println!(
                "{:<12} {:<40} {:<10} {:<14} CATEGORY",
                "ID", "NAME", "SEVERITY", "DIALECT"
            );
            println!("{}", "-".repeat(100));
            for rule in &rules {
                println!(
                    "{:<12} {:<40} {:<10} {:<14} {}",
                    rule.id,
                    rule.name,
                    rule.default_severity.to_string(),
                    rule.dialect.to_string(),
                    rule.category,
                );
            }
        }
    }

    Ok(0)
}

fn cmd_init(force: bool) -> Result<i32, ScanError> {
    let path = PathBuf::from(CONFIG_FILE);

    if path.exists() && !force {
        eprintln!("{} already exists. Use --force to overwrite.", CONFIG_FILE);
        return Ok(1);
    }

    std::fs::write(&path, Config::starter_toml())?;
    println!("Created {}", CONFIG_FILE);

    Ok(0)
}
