use std::process::ExitCode;

use camino::Utf8PathBuf;
use chrono::{Datelike, Local};
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use reach_stats::app::{self, App};
use reach_stats::conda::SystemCondaClient;
use reach_stats::config::{ConfigLoader, Credentials, SourceSelection, default_repository};
use reach_stats::cran::CranHttpClient;
use reach_stats::error::StatsError;
use reach_stats::github::GithubHttpClient;
use reach_stats::output::{HumanOutput, JsonOutput, OutputMode};
use reach_stats::pypi::PypiHttpClient;
use reach_stats::store::RawStore;

const BIOCONDA_CHANNEL: &str = "bioconda";

#[derive(Parser)]
#[command(name = "reach-stats")]
#[command(about = "Collect package download and repository traffic stats into yearly reports")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Register a project in the repository list")]
    AddRepo(AddRepoArgs),
    #[command(about = "Fetch raw stats for every repository list entry")]
    CollectStats(CollectArgs),
    #[command(about = "Aggregate raw stats into the reports of one year")]
    GenerateReports(GenerateArgs),
}

#[derive(Args)]
struct AddRepoArgs {
    #[arg(long)]
    project: String,

    /// Defaults to RECETOX/<project>
    #[arg(long)]
    repository: Option<String>,

    #[arg(long, default_value = "repository_list.tsv")]
    repository_list: Utf8PathBuf,

    #[arg(long)]
    pypi: bool,

    #[arg(long)]
    bioconda: bool,

    #[arg(long)]
    cran: bool,

    #[arg(long)]
    github: bool,
}

#[derive(Args)]
struct CollectArgs {
    #[arg(long, default_value = "repository_list.tsv")]
    repository_list: Utf8PathBuf,

    #[arg(long, default_value = "tmp")]
    tmp_dir: Utf8PathBuf,
}

#[derive(Args)]
struct GenerateArgs {
    /// Defaults to the current year
    #[arg(long)]
    year: Option<i32>,

    #[arg(long, default_value = "tmp")]
    tmp_dir: Utf8PathBuf,

    #[arg(long, default_value = "reports")]
    output_dir: Utf8PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<StatsError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &StatsError) -> u8 {
    match error {
        StatsError::InvalidSource(_)
        | StatsError::InvalidPeriod(_)
        | StatsError::InvalidRawFileName(_)
        | StatsError::ConfigRead(_)
        | StatsError::ConfigParse(_)
        | StatsError::NoSourceSelected => 2,
        StatsError::Merge { .. } => 4,
        error if error.is_fetch() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    match cli.command {
        Commands::AddRepo(args) => run_add_repo(args, output_mode),
        Commands::CollectStats(args) => run_collect(args, output_mode),
        Commands::GenerateReports(args) => run_generate(args, output_mode),
    }
}

fn run_add_repo(args: AddRepoArgs, output_mode: OutputMode) -> miette::Result<()> {
    let repository = args
        .repository
        .unwrap_or_else(|| default_repository(&args.project));
    let selection = SourceSelection {
        pypi: args.pypi,
        bioconda: args.bioconda,
        cran: args.cran,
        github: args.github,
    };
    let result = app::add_repository(&args.repository_list, &repository, &args.project, selection)?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_add_repo(&result).into_diagnostic(),
        OutputMode::Human => HumanOutput::print_add_repo(&result).into_diagnostic(),
    }
}

fn run_collect(args: CollectArgs, output_mode: OutputMode) -> miette::Result<()> {
    let entries = ConfigLoader::load(&args.repository_list)?;
    let credentials = Credentials::from_env();

    let pypi = PypiHttpClient::new(credentials.pepy_api_key)?;
    let github = GithubHttpClient::new(credentials.github_token)?;
    let cran = CranHttpClient::new()?;
    let conda = SystemCondaClient::new(BIOCONDA_CHANNEL);
    let app = App::new(RawStore::new(args.tmp_dir), pypi, github, cran, conda);

    let result = app.collect(&entries, Local::now().naive_local());
    match output_mode {
        OutputMode::Json => JsonOutput::print_collect(&result).into_diagnostic(),
        OutputMode::Human => HumanOutput::print_collect(&result).into_diagnostic(),
    }
}

fn run_generate(args: GenerateArgs, output_mode: OutputMode) -> miette::Result<()> {
    let year = args.year.unwrap_or_else(|| Local::now().year());
    let store = RawStore::new(args.tmp_dir);
    let result = app::generate_reports(&store, &args.output_dir, year)?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_generate(&result).into_diagnostic(),
        OutputMode::Human => HumanOutput::print_generate(&result).into_diagnostic(),
    }
}
