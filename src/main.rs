use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use contribpulse::models::{Lookup, ResultDocument};
use contribpulse::queue::WorkerReport;
use contribpulse::{
    Config, GitHubClient, Orchestrator, OrchestratorConfig, ResultStore, SqliteStore, TaskQueue,
    Worker,
};

#[derive(Parser, Debug)]
#[command(name = "contribpulse")]
#[command(version = "0.1.0")]
#[command(about = "Rank the contributors of a GitHub repository by activity")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Database path for storing results (overrides DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one repository and print its contributor summary
    Analyze {
        /// Repository URL, e.g. https://github.com/owner/name
        repo_url: String,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Process JSON task messages ({"task_id", "repo_url"}) read line by line from stdin
    Serve {
        /// Maximum number of tasks processed at once
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Print the stored result for a task id
    Result {
        task_id: String,

        /// Output format (json, text)
        #[arg(short, long, default_value = "json")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; stdout is reserved for results
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("contribpulse=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(database) = args.database {
        config.database_path = database;
    }

    let store = Arc::new(SqliteStore::new(&config.database_path)?);

    match args.command {
        Command::Analyze {
            repo_url,
            format,
            output,
        } => {
            let worker = build_worker(&config, store.clone())?;
            analyze(&worker, store.as_ref(), &repo_url, &format, output.as_deref()).await
        }
        Command::Serve { concurrency } => {
            if let Some(concurrency) = concurrency {
                config.concurrency_limit = concurrency;
            }
            let worker = build_worker(&config, store)?;
            serve(worker).await;
            // The stdin reader may still be parked in a blocking read.
            std::process::exit(0);
        }
        Command::Result { task_id, format } => match store.lookup(&task_id).await? {
            Lookup::Found(document) => output_document(&document, &format, None),
            Lookup::Failed(record) => {
                anyhow::bail!("Task {} failed: {} ({})", task_id, record.reason, record.message)
            }
            Lookup::NotFound => anyhow::bail!("Result not found for task {}", task_id),
        },
    }
}

fn build_worker(config: &Config, store: Arc<SqliteStore>) -> anyhow::Result<Worker> {
    if config.github_token.is_none() {
        tracing::warn!("GITHUB_TOKEN environment variable not set. Tasks will be dropped.");
    }

    let github = GitHubClient::from_config(config)?;
    let orchestrator = Orchestrator::new(
        Arc::new(github),
        store,
        OrchestratorConfig::from(config),
    );
    Ok(Worker::new(Arc::new(orchestrator), config.concurrency_limit))
}

async fn analyze(
    worker: &Worker,
    store: &dyn ResultStore,
    repo_url: &str,
    format: &str,
    output: Option<&str>,
) -> anyhow::Result<()> {
    let (queue, rx) = TaskQueue::channel(1);
    let task_id = queue.submit(repo_url).await?;
    drop(queue);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.set_message(format!("Analyzing {}", repo_url));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    worker.run(rx, shutdown_rx).await;
    spinner.finish_and_clear();

    match store.lookup(&task_id).await? {
        Lookup::Found(document) => output_document(&document, format, output),
        Lookup::Failed(record) => anyhow::bail!("Analysis failed: {} ({})", record.reason, record.message),
        Lookup::NotFound => anyhow::bail!("Analysis of {} produced no result, see the log above", repo_url),
    }
}

async fn serve(worker: Worker) -> WorkerReport {
    let (queue, rx) = TaskQueue::channel(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if queue.publish(line.as_bytes().to_vec()).await.is_err() {
                break;
            }
        }
        tracing::info!("Input closed, no more tasks will be queued");
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let report = worker.run(rx, shutdown_rx).await;
    reader.abort();
    report
}

fn output_document(document: &ResultDocument, format: &str, output: Option<&str>) -> anyhow::Result<()> {
    let rendered = match format {
        "json" => serde_json::to_string_pretty(document)?,
        _ => format_text(document),
    };

    if let Some(path) = output {
        std::fs::write(path, &rendered)?;
        tracing::info!("Output written to: {}", path);
    } else {
        println!("{}", rendered);
    }

    Ok(())
}

fn format_text(document: &ResultDocument) -> String {
    let summary = &document.summary;
    let mut output = String::new();

    output.push_str(&format!("\n=== Contributors: {} ===\n\n", document.repo_url));
    output.push_str(&format!("Task: {}\n", document.task_id));
    output.push_str(&format!("Commits: {}\n", summary.total_commits));
    output.push_str(&format!("Pull requests: {}\n", summary.total_prs));
    output.push_str(&format!("Issues: {}\n", summary.total_issues));

    if !summary.incomplete.is_empty() {
        let kinds: Vec<_> = summary.incomplete.iter().map(|k| k.as_str()).collect();
        output.push_str(&format!("Incomplete (fetch stopped early): {}\n", kinds.join(", ")));
    }

    output.push_str("\nTop Contributors:\n");
    if summary.top_contributors.is_empty() {
        output.push_str("  (none)\n");
    }
    for (rank, entry) in summary.top_contributors.iter().enumerate() {
        output.push_str(&format!(
            "  {:>2}. {} - {} (commits: {}, PRs: {}, issues: {})\n",
            rank + 1,
            entry.user,
            entry.total,
            entry.commits,
            entry.pull_requests,
            entry.issues
        ));
    }

    output.push_str(&format!(
        "\nProcessed on: {}\n",
        document.processed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output
}
