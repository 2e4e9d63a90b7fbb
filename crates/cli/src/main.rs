//! Rebaser command-line tool.
//!
//! Rebases a branch of dependency updates onto its target, resolving version
//! conflicts automatically. Also exposes the resolver and version comparison
//! on their own, and generates / validates configuration files.

mod style;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use rebaser_core::{
    extract_dependency, ConflictResolver, GitCli, RebaseResult, Rebaser, RebaserConfig, Version,
};

/// Configuration file looked up in the working directory.
const LOCAL_CONFIG: &str = "rebaser.toml";

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Rebase dependency update branches, resolving version conflicts.
#[derive(Parser, Debug)]
#[command(
    name = "rebaser",
    version,
    about = "Rebase a branch of dependency updates, resolving version conflicts automatically"
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults to ./rebaser.toml, then
    /// the user config directory.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebase the current branch onto the target branch.
    Rebase(RebaseArgs),

    /// Resolve conflicts in files in place.
    Resolve {
        /// Conflicted files.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Compare two versions and print <, = or >.
    Compare { a: String, b: String },

    /// Print the dependency declared by a line as JSON.
    Extract { text: String },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = LOCAL_CONFIG)]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

/// Flags for `rebase`; each one overrides the configuration file.
#[derive(Args, Debug, Default)]
struct RebaseArgs {
    /// Branch to rebase onto [default: main].
    #[arg(long)]
    branch: Option<String>,

    /// Repository working tree [default: current directory].
    #[arg(long)]
    repository: Option<PathBuf>,

    /// Committer name [default: github-actions[bot]].
    #[arg(long)]
    user_name: Option<String>,

    /// Committer email [default: github-actions[bot]@users.noreply.github.com].
    #[arg(long)]
    user_email: Option<String>,

    /// Open an editor for conflicts that cannot be resolved automatically.
    #[arg(long)]
    interactive: bool,

    /// Editor command for interactive mode, e.g. "code --wait".
    #[arg(long)]
    editor: Option<String>,
}

impl RebaseArgs {
    fn apply(self, config: &mut RebaserConfig) {
        if let Some(branch) = self.branch {
            config.rebase.branch = branch;
        }
        if let Some(repository) = self.repository {
            config.rebase.repository = repository;
        }
        if let Some(name) = self.user_name {
            config.identity.name = name;
        }
        if let Some(email) = self.user_email {
            config.identity.email = email;
        }
        if self.interactive {
            config.rebase.interactive = true;
        }
        if let Some(editor) = self.editor {
            config.rebase.editor = editor.split_whitespace().map(String::from).collect();
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", style::error(&format!("Error: {:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if let Commands::Init { output } = &cli.command {
        init_logging(cli.verbose, "warn");
        return cmd_init(output).map(|()| ExitCode::SUCCESS);
    }

    let config_path = find_config(cli.config.as_deref());
    let config = load_config(config_path.as_deref())?;
    init_logging(cli.verbose, &config.logging.level);
    debug!(path = ?config_path, "configuration resolved");

    match cli.command {
        Commands::Rebase(args) => cmd_rebase(config, args).await,
        Commands::Resolve { files } => cmd_resolve(&config, &files).await,
        Commands::Compare { a, b } => cmd_compare(&a, &b),
        Commands::Extract { text } => cmd_extract(&text),
        Commands::Validate => cmd_validate(config_path.as_deref(), &config),
        Commands::Init { .. } => Ok(ExitCode::SUCCESS),
    }
}

fn init_logging(verbose: bool, level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// The explicit path if given, otherwise the first default location that
/// exists.
fn find_config(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("rebaser").join("config.toml"))
        .filter(|path| path.exists())
}

fn load_config(path: Option<&Path>) -> Result<RebaserConfig> {
    match path {
        Some(path) => {
            RebaserConfig::load_from_file(path).context("failed to load configuration file")
        }
        None => Ok(RebaserConfig::default()),
    }
}

/// Append `result=<state>` to the GitHub Actions step output file.
fn append_github_output(path: &Path, result: RebaseResult) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "result={result}").context("failed to write step output")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_rebase(mut config: RebaserConfig, args: RebaseArgs) -> Result<ExitCode> {
    args.apply(&mut config);
    if config.rebase.interactive && std::env::var("GITHUB_ACTIONS").as_deref() == Ok("true") {
        warn!("interactive mode is not available in GitHub Actions");
        config.rebase.interactive = false;
    }
    let rebaser = Rebaser::<GitCli>::from_config(&config).context("failed to set up rebase")?;

    let github_output = std::env::var_os("GITHUB_OUTPUT").map(PathBuf::from);
    let result = match rebaser.run().await {
        Ok(result) => result,
        Err(e) => {
            if let Some(output) = &github_output {
                append_github_output(output, RebaseResult::Error)?;
            }
            return Err(anyhow::Error::new(e).context("rebase failed"));
        }
    };

    if let Some(output) = &github_output {
        append_github_output(output, result)?;
    }
    println!("{}", style::rebase_result(result, &config.rebase.branch));
    println!("{}", style::dim(&format!("result={result}")));

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn cmd_resolve(config: &RebaserConfig, files: &[PathBuf]) -> Result<ExitCode> {
    let resolver = ConflictResolver::new(config.resolver.clone());
    let mut unresolved = 0usize;

    for file in files {
        let resolved = resolver
            .resolve_file(file)
            .await
            .with_context(|| format!("failed to resolve {}", file.display()))?;
        if resolved {
            println!("{}", style::success(&file.display().to_string()));
        } else {
            unresolved += 1;
            println!("{}", style::warn(&format!("{} (unresolved)", file.display())));
        }
    }

    if unresolved > 0 {
        println!();
        println!("{} of {} file(s) left unresolved", unresolved, files.len());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_compare(a: &str, b: &str) -> Result<ExitCode> {
    let a = Version::from_str(a).context("first argument")?;
    let b = Version::from_str(b).context("second argument")?;
    println!("{}", ordering_symbol(a.cmp(&b)));
    Ok(ExitCode::SUCCESS)
}

fn ordering_symbol(ordering: std::cmp::Ordering) -> &'static str {
    match ordering {
        std::cmp::Ordering::Less => "<",
        std::cmp::Ordering::Equal => "=",
        std::cmp::Ordering::Greater => ">",
    }
}

fn cmd_extract(text: &str) -> Result<ExitCode> {
    match extract_dependency(text) {
        Some(dependency) => {
            let json =
                serde_json::to_string(&dependency).context("failed to serialize dependency")?;
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("{}", style::warn("no dependency found"));
            Ok(ExitCode::FAILURE)
        }
    }
}

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }
    std::fs::write(output, RebaserConfig::default_template())
        .context("failed to write config file")?;

    println!(
        "{}",
        style::success(&format!("Default configuration written to {}", output.display()))
    );
    println!();
    println!("Next steps:");
    println!("  1. Set the target branch and committer identity");
    println!("  2. Validate with: rebaser validate --config {}", output.display());
    println!("  3. Rebase with: rebaser rebase --config {}", output.display());
    Ok(())
}

fn cmd_validate(path: Option<&Path>, config: &RebaserConfig) -> Result<ExitCode> {
    let Some(path) = path else {
        anyhow::bail!("no configuration file found; pass --config or run `rebaser init`");
    };

    println!("{}", style::header(&format!("Validating configuration: {}", path.display())));
    println!();
    println!("  [OK] TOML structure is valid");

    if let Err(e) = config.validate() {
        println!("  [FAIL] Validation error: {}", e);
        anyhow::bail!("configuration validation failed");
    }
    println!("  [OK] All required fields are valid");

    println!();
    println!("Configuration summary:");
    println!("  Branch        : {}", config.rebase.branch);
    println!("  Repository    : {}", config.rebase.repository.display());
    println!("  Committer     : {} <{}>", config.identity.name, config.identity.email);
    println!(
        "  Interactive   : {}",
        if config.rebase.interactive { config.rebase.editor.join(" ") } else { "off".into() }
    );
    println!("  Lock file     : {}", config.resolver.lock_file_name);
    println!("  Install       : {}", config.resolver.install_command.join(" "));
    println!("  Log level     : {}", config.logging.level);
    println!();
    println!("{}", style::success("Configuration is valid."));
    Ok(ExitCode::SUCCESS)
}
