use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use consign::PublishError;
use consign::config::{
    CONFIG_FILE, CliOverrides, ConsignConfig, DEFAULT_REPOSITORY, parse_repository, tool_programs,
};
use consign::control::GitRepository;
use consign::engine::{self, Prompt, PublishOutcome, Reporter, Toolset};
use consign::submit::Transfer;
use consign::tools::{BuildCommand, PackageManagerCommand};
use consign::types::Section;

#[derive(Parser, Debug)]
#[command(name = "consign", version)]
#[command(about = "Submit package archives to a build2-style archive repository")]
struct Cli {
    /// Increase output verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress everything but warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Distribute, verify, and submit packages to the repository.
    Publish(PublishArgs),
    /// Print project, configuration, and tool diagnostics.
    Doctor {
        /// Project directory.
        #[arg(short = 'd', long = "directory", default_value = ".")]
        directory: PathBuf,

        /// How long to wait for each `--version` query (e.g. 10s, 500ms).
        #[arg(long, default_value = "10s")]
        timeout: String,
    },
    /// Print shell completions to standard output.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args, Debug)]
struct PublishArgs {
    /// Packages to publish. If omitted, `project.packages` from the config
    /// file is used.
    #[arg(value_name = "PKG")]
    packages: Vec<String>,

    /// Project directory.
    #[arg(short = 'd', long = "directory", default_value = ".")]
    directory: PathBuf,

    /// Build configuration directory the packages are initialized in.
    #[arg(short = 'c', long = "config", value_name = "CFG")]
    config: Option<PathBuf>,

    /// Archive repository to submit to (default: https://cppget.org).
    #[arg(long, value_name = "URL")]
    repository: Option<String>,

    /// Control repository URL, or `none` to omit it.
    #[arg(long, value_name = "URL")]
    control: Option<String>,

    /// Publisher email (default: git `user.email`).
    #[arg(long, value_name = "ADDR")]
    email: Option<String>,

    /// Repository section, overriding the one derived from the version.
    #[arg(long)]
    section: Option<Section>,

    /// Ask the repository to simulate the given outcome.
    #[arg(long, value_name = "OUTCOME")]
    simulate: Option<String>,

    /// Do not ask for confirmation.
    #[arg(short, long)]
    yes: bool,

    /// Build tool program.
    #[arg(long, value_name = "PROG")]
    build: Option<String>,

    /// Package manager program.
    #[arg(long, value_name = "PROG")]
    package_manager: Option<String>,

    /// Transfer tool program.
    #[arg(long, value_name = "PROG")]
    curl: Option<String>,

    /// Extra option for the transfer tool (repeatable).
    #[arg(long = "curl-option", value_name = "OPT", allow_hyphen_values = true)]
    curl_options: Vec<String>,
}

/// Reporter printing to stderr, filtered by verbosity.
struct CliReporter {
    verbosity: u8,
}

impl Reporter for CliReporter {
    fn text(&mut self, msg: &str) {
        if self.verbosity >= 1 {
            eprintln!("{msg}");
        }
    }

    fn info(&mut self, msg: &str) {
        if self.verbosity >= 2 {
            eprintln!("[info] {msg}");
        }
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("[warn] {msg}");
    }
}

/// Yes/no prompt on stdin; asks again until it gets `y` or `n`.
struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        let stdin = io::stdin();
        loop {
            eprint!("{question} ");
            io::stderr().flush().context("failed to flush stderr")?;

            let mut answer = String::new();
            let n = stdin
                .lock()
                .read_line(&mut answer)
                .context("unable to read answer")?;
            if n == 0 {
                bail!("unable to read answer: end of input");
            }

            match answer.trim() {
                "y" => return Ok(true),
                "n" => return Ok(false),
                _ => {}
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = if cli.quiet {
        0
    } else {
        cli.verbose.saturating_add(1)
    };
    let mut reporter = CliReporter { verbosity };

    match run(cli.cmd, verbosity, &mut reporter) {
        Ok(code) => code,
        Err(err) => {
            print_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cmd: Commands, verbosity: u8, reporter: &mut CliReporter) -> Result<ExitCode> {
    match cmd {
        Commands::Publish(args) => run_publish(args, verbosity, reporter),
        Commands::Doctor { directory, timeout } => {
            run_doctor(&directory, parse_duration(&timeout)?, reporter)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "consign", &mut io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_publish(args: PublishArgs, verbosity: u8, reporter: &mut CliReporter) -> Result<ExitCode> {
    let project_dir = canonical_project_dir(&args.directory)?;
    let file = load_config(&project_dir)?;

    let overrides = CliOverrides {
        packages: args.packages,
        config: args.config,
        repository: args.repository,
        control: args.control,
        email: args.email,
        section: args.section,
        simulate: args.simulate,
        yes: args.yes,
        build: args.build,
        package_manager: args.package_manager,
        transfer: args.curl,
        transfer_options: args.curl_options,
        verbosity,
    };
    let opts = file
        .unwrap_or_default()
        .build_publish_options(&project_dir, overrides)?;

    let build = BuildCommand::new(&opts.tools.build);
    let package_manager = PackageManagerCommand::new(&opts.tools.package_manager);
    let transfer = Transfer::new(
        &opts.tools.transfer,
        opts.tools.transfer_options.clone(),
        opts.verbosity,
    );
    let tools = Toolset {
        build: &build,
        package_manager: &package_manager,
        submitter: &transfer,
    };
    let vcs = GitRepository::new(&opts.project_dir);

    match engine::run_publish(&opts, &vcs, &tools, &mut StdinPrompt, reporter)? {
        PublishOutcome::Declined => Ok(ExitCode::FAILURE),
        PublishOutcome::Published(_) => Ok(ExitCode::SUCCESS),
    }
}

fn run_doctor(directory: &Path, timeout: Duration, reporter: &mut dyn Reporter) -> Result<()> {
    let project_dir = canonical_project_dir(directory)?;
    let file = load_config(&project_dir)?;

    println!("project_dir: {}", project_dir.display());
    match &file {
        Some(_) => println!("config_file: {}", project_dir.join(CONFIG_FILE).display()),
        None => println!("config_file: none"),
    }

    let repository = file
        .as_ref()
        .and_then(|c| c.publish.repository.as_deref())
        .unwrap_or(DEFAULT_REPOSITORY);
    println!("repository: {}", parse_repository(repository)?);

    println!();

    let tools = tool_programs(file.as_ref());
    print_tool_version("build", &tools.build, timeout, reporter);
    print_tool_version("package_manager", &tools.package_manager, timeout, reporter);
    print_tool_version("transfer", &tools.transfer, timeout, reporter);
    print_tool_version("git", &consign_git::git_program(), timeout, reporter);

    Ok(())
}

fn print_tool_version(label: &str, program: &str, timeout: Duration, reporter: &mut dyn Reporter) {
    if consign_process::which(program).is_none() {
        reporter.warn(&format!("{label} program {program} not found"));
        return;
    }

    match consign_process::run_command_with_timeout(program, &["--version"], timeout) {
        Ok(r) if r.success => {
            println!("{label}: {}", r.first_line().unwrap_or("(no version output)"));
        }
        Ok(r) if r.timed_out => {
            reporter.warn(&format!(
                "{program} --version timed out after {}",
                humantime::format_duration(timeout)
            ));
        }
        Ok(r) => {
            reporter.warn(&format!("{program} --version failed: {}", r.stderr.trim()));
        }
        Err(e) => {
            reporter.warn(&format!("unable to run {program} --version: {e:#}"));
        }
    }
}

fn canonical_project_dir(dir: &Path) -> Result<PathBuf> {
    dir.canonicalize()
        .with_context(|| format!("unable to access project directory {}", dir.display()))
}

fn load_config(project_dir: &Path) -> Result<Option<ConsignConfig>> {
    let file = ConsignConfig::load_from_project(project_dir)?;
    if let Some(config) = &file {
        config
            .validate()
            .with_context(|| format!("invalid {CONFIG_FILE}"))?;
    }
    Ok(file)
}

fn parse_duration(s: &str) -> Result<Duration> {
    humantime::parse_duration(s).with_context(|| format!("invalid duration: {s}"))
}

/// Print the context chain down to the first classified error, then its
/// hints.
fn print_error(err: &anyhow::Error) {
    let mut parts = Vec::new();
    let mut hints = Vec::new();
    for cause in err.chain() {
        parts.push(cause.to_string());
        if let Some(e) = cause.downcast_ref::<PublishError>() {
            hints = e.hints();
            break;
        }
    }

    eprintln!("error: {}", parts.join(": "));
    for hint in hints {
        eprintln!("  info: {hint}");
    }
}
