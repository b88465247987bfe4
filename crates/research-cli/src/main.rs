//! Terminal front end for the research agent service.

mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use research_client::diagram::DiagramOutcome;
use research_client::report::{mermaid_blocks, strip_wrapping_fence};
use research_client::session::EMPTY_REPORT_FALLBACK;
use research_client::{
    Audience, Document, MetricsSnapshot, MmdcConfig, MmdcEngine, RenderQueue, ResearchClient,
    ResearchRequest, SessionBoard, init_observability, render_diagram,
};
use tokio::sync::mpsc;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "research", version, about = "Ask the research agent and follow its progress")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a question and stream progress until the report arrives.
    Ask {
        question: String,
        /// engineer or executive
        #[arg(long, default_value = "engineer")]
        audience: Audience,
        /// PDF to ground the research on.
        #[arg(long)]
        pdf: Option<PathBuf>,
        /// Render mermaid diagrams in the report to SVG files in this directory.
        #[arg(long)]
        diagrams: Option<PathBuf>,
    },
    /// List past runs, newest first.
    History,
    /// Print a stored report.
    Show { run_id: String },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    dotenvy::dotenv().ok();
    init_observability();

    let cli = Cli::parse();
    let client = ResearchClient::from_env()?;
    match cli.command {
        Command::Ask {
            question,
            audience,
            pdf,
            diagrams,
        } => ask(&client, question, audience, pdf, diagrams).await,
        Command::History => {
            history(&client).await;
            Ok(())
        }
        Command::Show { run_id } => show(&client, &run_id).await,
    }
}

async fn ask(
    client: &ResearchClient,
    question: String,
    audience: Audience,
    pdf: Option<PathBuf>,
    diagrams: Option<PathBuf>,
) -> CliResult<()> {
    let mut request = ResearchRequest::new(question).audience(audience);
    if let Some(path) = pdf {
        request = request.document(Document::from_path(path).await?);
    }

    let mut board = SessionBoard::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let session_id = board.begin();
    client.start_session(request, session_id, tx)?;

    let mut last_frame = String::new();
    while let Some(message) = rx.recv().await {
        board.apply(message);
        if let Some(view) = board.progress() {
            let frame = render::progress(&view);
            if frame != last_frame {
                eprintln!("{frame}\n");
                last_frame = frame;
            }
        }
        if !board.is_running() {
            break;
        }
    }

    if let Some(message) = board.error_message() {
        return Err(message.into());
    }
    let report = strip_wrapping_fence(board.report_text().unwrap_or(EMPTY_REPORT_FALLBACK));
    println!("{report}");
    if let Some(dir) = diagrams {
        render_diagrams(report, &dir).await?;
    }
    print_metrics(board.metrics());
    Ok(())
}

async fn history(client: &ResearchClient) {
    let runs = client.list_runs_or_empty().await;
    if runs.is_empty() {
        println!("No past runs.");
        return;
    }
    let now = chrono::Utc::now();
    for run in &runs {
        println!("{}", render::history_row(run, now));
    }
}

async fn show(client: &ResearchClient, run_id: &str) -> CliResult<()> {
    let record = client.get_run(run_id).await?;
    println!("# {}\n", record.question);
    let report = strip_wrapping_fence(&record.report);
    if report.is_empty() {
        println!("{EMPTY_REPORT_FALLBACK}");
    } else {
        println!("{report}");
    }
    print_metrics(record.metrics_snapshot().as_ref());
    Ok(())
}

fn print_metrics(metrics: Option<&MetricsSnapshot>) {
    if let Some(metrics) = metrics.filter(|m| m.has_data()) {
        println!("\n{}", metrics.summary());
    }
}

/// Submits every mermaid block at once; the queue renders them one at a time.
async fn render_diagrams(report: &str, out_dir: &Path) -> CliResult<()> {
    let charts = mermaid_blocks(report);
    if charts.is_empty() {
        return Ok(());
    }
    tokio::fs::create_dir_all(out_dir).await?;

    let engine = MmdcEngine::new(MmdcConfig::from_env());
    let queue = RenderQueue::install_global(Arc::new(engine));
    let pending: Vec<_> = charts
        .iter()
        .map(|chart| render_diagram(&queue, chart))
        .collect();

    for (i, outcome) in futures::future::join_all(pending).await.into_iter().enumerate() {
        let index = i + 1;
        match outcome {
            DiagramOutcome::Rendered(output) => {
                let path = out_dir.join(format!("diagram-{index}.svg"));
                tokio::fs::write(&path, output.svg).await?;
                println!("diagram {index}: {}", path.display());
            }
            DiagramOutcome::Fallback { source, error } => {
                println!("{}", render::diagram_fallback(index, &source, &error.to_string()));
            }
        }
    }
    Ok(())
}
