//! CLI command definitions, routing, and tracing setup.

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use optdesk_client::StageClient;
use optdesk_core::{CannedStore, SessionOrchestrator, StageObserver};
use optdesk_shared::{
    AppConfig, ConversationEntry, Formulation, Insight, OptdeskError, Problem, ServiceConfig,
    Solution, Stage, StageBundle, config_file_path, init_config, load_config, validate_service,
};
use optdesk_typeset::{Rendered, TypesetOptions};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// OptDesk — describe an optimization problem, watch the answer assemble.
#[derive(Parser)]
#[command(
    name = "optdesk",
    version,
    about = "Staged optimization assistant: insights, formulation, code, and solution.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Solve a problem, revealing the four artifacts as they arrive.
    Solve {
        /// Free-form problem text.
        text: Vec<String>,

        /// Solve a catalog problem by id instead of free text.
        #[arg(short, long)]
        problem: Option<String>,

        /// Regenerate the answer once after the first run completes.
        #[arg(long)]
        regenerate: bool,
    },

    /// List the solver service's problem catalog.
    Problems,

    /// Solve in a single shot via the legacy endpoint (no progressive reveal).
    Once {
        /// Free-form problem text.
        text: Vec<String>,
    },

    /// Check solver service liveness.
    Health,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "optdesk=info",
        1 => "optdesk=debug",
        _ => "optdesk=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Solve {
            text,
            problem,
            regenerate,
        } => cmd_solve(&text, problem.as_deref(), regenerate).await,
        Command::Problems => cmd_problems().await,
        Command::Once { text } => cmd_once(&text).await,
        Command::Health => cmd_health().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// solve
// ---------------------------------------------------------------------------

async fn cmd_solve(text: &[String], problem_id: Option<&str>, regenerate: bool) -> Result<()> {
    let config = load_config()?;
    validate_service(&config)?;

    let client = StageClient::new(&ServiceConfig::from(&config))?;
    let canned = CannedStore::bundled(config.stage_delay())?;

    let problem = match problem_id {
        Some(id) => resolve_catalog_problem(&client, &canned, id).await?,
        None => {
            let joined = text.join(" ");
            if joined.trim().is_empty() {
                return Err(eyre!("provide problem text or --problem <id>"));
            }
            Problem::custom(joined)
        }
    };

    info!(problem_id = %problem.id, regenerate, "submitting problem");

    let session = SessionOrchestrator::new(client, canned);
    let reporter = CliProgress::new();

    session.submit(&problem, &reporter).await?;

    if regenerate {
        reporter.restart("Regenerating answer");
        session.regenerate(&reporter).await?;
    }

    reporter.finish();
    Ok(())
}

/// Look up a catalog problem by id, falling back to the local demo bundle
/// when the catalog itself is unreachable.
async fn resolve_catalog_problem(
    client: &StageClient,
    canned: &CannedStore,
    id: &str,
) -> Result<Problem> {
    match client.problems().await {
        Ok(catalog) => catalog
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| eyre!("problem '{id}' not found in the catalog")),
        Err(e) if canned.contains(id) => {
            tracing::warn!(error = %e, "catalog unreachable, using local demo problem");
            Ok(Problem {
                id: id.to_string(),
                title: id.to_string(),
                description: format!("Demo playback of catalog problem '{id}'"),
            })
        }
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner-based observer: prints each artifact as its stage arrives.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        spinner.set_message("Waiting for insights");
        Self { spinner }
    }

    fn restart(&self, message: &str) {
        self.spinner.set_message(message.to_string());
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl StageObserver for CliProgress {
    fn stage_filled(&self, stage: Stage, entry: &ConversationEntry) {
        let ConversationEntry::Assistant { bundle, .. } = entry else {
            return;
        };
        self.spinner.suspend(|| print_stage(stage, bundle));

        let next = match stage {
            Stage::Insights => "Waiting for formulation",
            Stage::Formulation => "Waiting for code",
            Stage::Code => "Waiting for solution",
            Stage::Solution => "Done",
        };
        self.spinner.set_message(next);
    }

    fn run_failed(&self, stage: Stage, error: &OptdeskError) {
        self.spinner.suspend(|| {
            println!();
            println!("  Answer halted at the {stage} stage: {error}");
            println!("  Run again with `optdesk solve --regenerate` to retry.");
        });
    }

    fn run_complete(&self, entry: &ConversationEntry) {
        if let ConversationEntry::Assistant { bundle, .. } = entry {
            self.spinner.suspend(|| {
                println!();
                println!(
                    "  Answer assembled ({} stages, source: {:?}).",
                    bundle.filled_count(),
                    bundle.source
                );
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Artifact printing
// ---------------------------------------------------------------------------

fn print_stage(stage: Stage, bundle: &StageBundle) {
    match stage {
        Stage::Insights => {
            if let Some(insights) = &bundle.insights {
                print_insights(insights);
            }
        }
        Stage::Formulation => {
            if let Some(formulation) = &bundle.formulation {
                print_formulation(formulation);
            }
        }
        Stage::Code => {
            if let Some(code) = &bundle.code {
                print_code(code);
            }
        }
        Stage::Solution => {
            if let Some(solution) = &bundle.solution {
                print_solution(solution);
            }
        }
    }
}

fn print_insights(insights: &[Insight]) {
    println!();
    println!("── Insights ──");
    if insights.is_empty() {
        println!("  (none)");
        return;
    }
    for insight in insights {
        println!("  [{}] {}", insight.category, insight.taxonomy_path);
        println!("      when: {}", insight.condition);
        println!("      {}", insight.explanation);
        println!("      e.g. {}", insight.example);
    }
}

fn print_formulation(formulation: &Formulation) {
    println!();
    println!("── Formulation ──");
    match formulation {
        Formulation::Text(text) => print_math_block(text),
        Formulation::Structured {
            objective,
            constraints,
            variables,
        } => {
            print_math_block(objective);
            println!("  subject to:");
            for constraint in constraints {
                print_math_block(constraint);
            }
            println!("  where: {variables}");
        }
    }
}

fn print_code(code: &str) {
    println!();
    println!("── Code ──");
    if code.is_empty() {
        println!("  (none)");
        return;
    }
    for line in code.lines() {
        println!("  {line}");
    }
}

fn print_solution(solution: &Solution) {
    println!();
    println!("── Solution ──");
    match solution {
        Solution::Text(text) => print_math_block(text),
        Solution::Structured {
            status,
            variables,
            objective,
            details,
        } => {
            println!("  status:    {status}");
            for (name, value) in variables {
                println!("  {name} = {value}");
            }
            if !objective.is_empty() {
                println!("  objective: {objective}");
            }
            if !details.is_empty() {
                println!("  {details}");
            }
        }
    }
}

/// Typeset-prepare a text block line by line and print the result.
///
/// Math lines show their rewritten typesetting form; everything else
/// (including anything the safety gate refused) prints verbatim.
fn print_math_block(text: &str) {
    let opts = TypesetOptions::default();
    for rendered in optdesk_typeset::render_block(text, &opts) {
        match rendered {
            Rendered::Math { tex, comment } => match comment {
                Some(comment) => println!("  {tex}    # {comment}"),
                None => println!("  {tex}"),
            },
            Rendered::Plain { text } => println!("  {text}"),
        }
    }
}

// ---------------------------------------------------------------------------
// problems / once / health
// ---------------------------------------------------------------------------

async fn cmd_problems() -> Result<()> {
    let config = load_config()?;
    validate_service(&config)?;

    let client = StageClient::new(&ServiceConfig::from(&config))?;
    let problems = client.problems().await?;

    println!();
    for problem in &problems {
        println!("  {}  —  {}", problem.id, problem.title);
        println!("      {}", problem.description);
    }
    println!();
    println!("  {} problem(s). Solve one with `optdesk solve --problem <id>`.", problems.len());

    Ok(())
}

async fn cmd_once(text: &[String]) -> Result<()> {
    let joined = text.join(" ");
    if joined.trim().is_empty() {
        return Err(eyre!("provide problem text"));
    }

    let config = load_config()?;
    validate_service(&config)?;

    let client = StageClient::new(&ServiceConfig::from(&config))?;
    let bundle = client.solve_once(&joined).await?;

    let insights = bundle
        .insights
        .iter()
        .map(optdesk_taxonomy::normalize)
        .collect::<optdesk_shared::Result<Vec<_>>>()?;

    print_insights(&insights);
    print_formulation(&bundle.formulation);
    print_code(&bundle.code);
    print_solution(&bundle.solution);

    Ok(())
}

async fn cmd_health() -> Result<()> {
    let config = load_config()?;
    validate_service(&config)?;

    let client = StageClient::new(&ServiceConfig::from(&config))?;
    let health = client.health().await?;

    println!("  {}: {}", health.status, health.message);
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("  Wrote default config to {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let rendered = toml::to_string_pretty(&config).map_err(|e| eyre!("render config: {e}"))?;

    println!("  Config file: {}", config_file_path()?.display());
    println!();
    for line in rendered.lines() {
        println!("  {line}");
    }
    Ok(())
}
