//! skillcheck CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::GlobalOptions;

#[derive(Parser)]
#[command(
    name = "skillcheck",
    version,
    about = "Grading, study plans and quiz generation for vocational training"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Provider to use instead of the configured default
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model to use instead of the configured default
    #[arg(long, global = true)]
    model: Option<String>,

    /// Write JSON results to this file instead of stdout
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade one submission
    Grade {
        /// Submission JSON file
        #[arg(long)]
        submission: PathBuf,
    },

    /// Grade many submissions concurrently
    Batch {
        /// JSON file holding an array of submissions
        #[arg(long)]
        submissions: PathBuf,

        /// Max concurrent submissions (default: from config)
        #[arg(long)]
        parallelism: Option<usize>,
    },

    /// Build a study plan and progress narrative for a student
    Recommend {
        /// JSON file with student_id, history, topic_scores and previous
        #[arg(long)]
        input: PathBuf,
    },

    /// Plan and generate a quiz
    Quiz {
        /// Quiz spec JSON file
        #[arg(long, conflicts_with = "adaptive", required_unless_present = "adaptive")]
        spec: Option<PathBuf>,

        /// JSON file with topic, total_questions and recent mastery
        #[arg(long)]
        adaptive: Option<PathBuf>,

        /// Print the question plan without generating questions
        #[arg(long)]
        plan_only: bool,
    },

    /// List available models (filtered by --provider when given)
    ListModels,

    /// Create a starter config and sample inputs
    Init,
}

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("skillcheck=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = GlobalOptions {
        config: cli.config,
        provider: cli.provider,
        model: cli.model,
        output: cli.output,
    };

    let result = match cli.command {
        Commands::Grade { submission } => commands::grade::execute(submission, &options).await,
        Commands::Batch {
            submissions,
            parallelism,
        } => commands::batch::execute(submissions, parallelism, &options).await,
        Commands::Recommend { input } => commands::recommend::execute(input, &options).await,
        Commands::Quiz {
            spec,
            adaptive,
            plan_only,
        } => commands::quiz::execute(spec, adaptive, plan_only, &options).await,
        Commands::ListModels => commands::list_models::execute(&options),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
