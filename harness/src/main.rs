use clap::{Parser, Subcommand};
use fixtures::{list_fixtures, write_fixtures, ProgramGenerator, ProjectLayout};
use harness::color::{self, emphasize, paint, BLUE, GREEN, MAGENTA, RED, YELLOW};
use harness::{
    bless, bless_executor, extract_errors, parse_modules, DiffStyle, Executor, HarnessConfig,
    ProcessExecutor, RunOptions, Runner, TestSelection,
};
use std::path::PathBuf;
use style::{discover_sources, FileReport, Severity, StyleChecker, StyleSummary};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "ampltest")]
#[command(about = "Build, run and check the AMPL compiler stages against their fixtures")]
struct Cli {
    /// Project root holding src/, bin/ and test/
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Config file (default: ampltest.toml in the project root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fixtures for one or more stages and compare with expected output
    Run {
        /// Stage name, comma-separated list of stages, or `all`
        modules: String,
        /// Fixture numbers, or a range `a..b` (inclusive)
        tests: Vec<String>,
        /// Show diffs in two columns
        #[arg(long)]
        side_by_side: bool,
        /// Per-fixture timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Run drivers under Valgrind
        #[arg(long)]
        valgrind: bool,
        /// Keep actual outputs in this directory instead of deleting them
        #[arg(long)]
        save: Option<PathBuf>,
        /// Use the drivers already in bin/
        #[arg(long)]
        no_build: bool,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record current driver output as the expected output
    Bless {
        /// Stage name
        module: String,
        /// Fixture numbers, or a range `a..b` (inclusive)
        tests: Vec<String>,
        /// Per-fixture timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Use the driver already in bin/
        #[arg(long)]
        no_build: bool,
    },
    /// List error lines from recorded stderr files
    Errors {
        /// Stage name
        module: String,
        /// Directory of .err files (default: test/<module>)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Check the C sources against the style rules
    Style {
        /// Files to check (default: every .c file under src/)
        files: Vec<PathBuf>,
        /// List files and rules, and report potential errors
        #[arg(short, long)]
        verbose: bool,
    },
    /// Generate random fixtures
    Generate {
        /// First fixture number
        #[arg(long, default_value = "31")]
        start: u32,
        /// Fixture number to stop before
        #[arg(long, default_value = "1000")]
        end: u32,
        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show configured stages and available fixtures
    List,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    color::init(cli.no_color);

    // Drivers run with test/ as their working directory, so every path
    // handed to them must be absolute.
    let root = std::fs::canonicalize(&cli.root)?;
    let layout = ProjectLayout::new(root.clone());
    let config = match &cli.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::discover(&root)?,
    };
    debug!("Using config {:?}", config);

    let success = match cli.command {
        Commands::Run {
            modules,
            tests,
            side_by_side,
            timeout,
            valgrind,
            save,
            no_build,
            json,
        } => {
            let build = config.build && !no_build;
            let valgrind = config.valgrind || valgrind;
            let side_by_side = config.side_by_side || side_by_side;
            let mut config = config
                .with_build(build)
                .with_valgrind(valgrind)
                .with_side_by_side(side_by_side);
            if let Some(secs) = timeout {
                config = config.with_timeout(std::time::Duration::from_secs(secs));
            }
            config.validate()?;
            run_tests(&layout, &config, &modules, &tests, save, json).await?
        }
        Commands::Bless {
            module,
            tests,
            timeout,
            no_build,
        } => {
            let build = config.build && !no_build;
            let mut config = config.with_build(build);
            if let Some(secs) = timeout {
                config = config.with_timeout(std::time::Duration::from_secs(secs));
            }
            config.validate()?;
            bless_tests(&layout, &config, &module, &tests).await?
        }
        Commands::Errors { module, dir } => {
            let module = fixtures::Module::new(module)?;
            let dir = dir.unwrap_or_else(|| layout.expected_dir(&module));
            for line in extract_errors(&dir)? {
                println!("{}:{}: {}", line.file.display(), line.line_number, line.text);
            }
            true
        }
        Commands::Style { files, verbose } => check_style(&layout, files, verbose)?,
        Commands::Generate { start, end, seed } => {
            let written = match seed {
                Some(seed) => {
                    write_fixtures(&layout, start, end, &mut ProgramGenerator::seeded(seed))?
                }
                None => write_fixtures(&layout, start, end, &mut ProgramGenerator::from_entropy())?,
            };
            println!("Generated {} fixtures in {}", written.len(), layout.inputs_dir().display());
            true
        }
        Commands::List => {
            let names: Vec<&str> = config.modules.iter().map(|m| m.as_str()).collect();
            println!("Modules: {}", names.join(", "));
            let numbers = list_fixtures(&layout)?;
            let numbers: Vec<String> = numbers.iter().map(u32::to_string).collect();
            println!("Fixtures ({}): {}", numbers.len(), numbers.join(" "));
            true
        }
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_tests(
    layout: &ProjectLayout,
    config: &HarnessConfig,
    modules: &str,
    tests: &[String],
    save: Option<PathBuf>,
    json: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let modules = parse_modules(modules, config)?;
    let selection = TestSelection::parse(tests, config.default_selection())?;
    let diff_style = if config.side_by_side {
        DiffStyle::SideBySide {
            width: config.side_by_side_width,
        }
    } else {
        DiffStyle::Unified
    };
    info!(
        "Testing {} modules on {} fixtures",
        modules.len(),
        selection.len()
    );

    let runner = Runner::new(layout.clone(), ProcessExecutor::from_config(layout.clone(), config))
        .with_diff_style(diff_style)
        .with_echo(!json);
    let options = RunOptions {
        selection,
        build: config.build,
        save,
    };
    let report = runner.run_modules(&modules, &options).await?;

    if json {
        println!("{}", report.to_json()?);
    } else if let Some(saved) = &report.saved_to {
        println!("Saved actual outputs to {}", saved.display());
    }
    Ok(report.all_passed())
}

async fn bless_tests(
    layout: &ProjectLayout,
    config: &HarnessConfig,
    module: &str,
    tests: &[String],
) -> Result<bool, Box<dyn std::error::Error>> {
    let module = fixtures::Module::new(module)?;
    let selection = TestSelection::parse(tests, config.default_selection())?;
    let executor = bless_executor(layout.clone(), config);

    if config.build {
        println!("{}", paint(BLUE, &format!("Compiling {module}...")));
        let status = executor.build(&module).await?;
        if !status.success {
            let code = status
                .exit_code
                .map_or_else(|| "none".to_string(), |c| c.to_string());
            println!(
                "{}",
                paint(
                    RED,
                    &format!("{} failed to compile with exit code {code}", module.title())
                )
            );
            return Ok(false);
        }
    }

    let report = bless(layout, &executor, &module, &selection).await?;
    for number in &report.blessed {
        println!("{}", paint(GREEN, &format!("Saved expected output for test {number}.")));
    }
    for skipped in &report.skipped {
        println!(
            "{}",
            paint(
                YELLOW,
                &format!("Skipped test {}: {}.", skipped.number, skipped.reason)
            )
        );
    }
    Ok(report.skipped.is_empty())
}

fn check_style(
    layout: &ProjectLayout,
    files: Vec<PathBuf>,
    verbose: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let files = if files.is_empty() {
        discover_sources(&layout.src_dir())?
    } else {
        files
    };
    let checker = StyleChecker::new()?.with_verbose(verbose);
    println!("{}", paint(BLUE, "Starting style check..."));

    if verbose {
        println!("Checking files:");
        for file in &files {
            println!("  {}", file.display());
        }
        println!("Rules:");
        for rule in checker.rules().iter() {
            println!(
                "  {:<45} {:<16} {}",
                rule.name,
                rule.severity.label(),
                rule.matcher.pattern()
            );
        }
        println!();
    }

    let reports = files
        .iter()
        .map(|file| checker.check_file(file))
        .collect::<Result<Vec<_>, _>>()?;
    for report in &reports {
        print_findings(report);
    }

    let summary = StyleSummary::from_reports(&reports);
    let message = format!(
        "Check finished with {} errors and {} warnings.",
        summary.errors, summary.warnings
    );
    let tone = if summary.errors > 0 {
        RED
    } else if summary.warnings > 0 {
        YELLOW
    } else {
        GREEN
    };
    println!("{}", paint(tone, &message));
    Ok(summary.passed())
}

fn print_findings(report: &FileReport) {
    for finding in &report.findings {
        let tone = match finding.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
            Severity::PotentialError => MAGENTA,
        };
        println!(
            "{}",
            paint(
                tone,
                &format!(
                    "{}: <{}> on line {} of {}",
                    finding.severity.label(),
                    finding.rule,
                    finding.line_number,
                    finding.file.display()
                )
            )
        );
        let line = match &finding.matched {
            Some(matched) => emphasize(&finding.line, matched),
            None => finding.line.clone(),
        };
        println!("> {line}");
        println!();
    }
}
