use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use pulse_client::{
    weigh, ClientConfig, ClientSession, Completion, Driver, DriverEvent, HttpTransport,
    ResetOutcome, SnapshotOutcome, SubmitOutcome, DEFAULT_SERVER_URL,
};
use pulse_core::Prompt;

const SETTLE_LIMIT: Duration = Duration::from_secs(12);

#[derive(Parser, Debug)]
#[command(name = "pulse-client", version, about = "Pulse live concept board client")]
struct Cli {
    #[arg(long, global = true, default_value = DEFAULT_SERVER_URL)]
    server: String,
    #[arg(long = "data-dir", global = true, default_value = ".pulse-client")]
    data_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Follow the live ranking.
    Watch {
        #[arg(long, value_enum, default_value_t = PromptArg::A)]
        prompt: PromptArg,
    },
    /// Submit one or more answers to prompt A.
    SubmitA {
        #[arg(required = true)]
        items: Vec<String>,
    },
    /// Submit a single answer to prompt B.
    SubmitB { item: String },
    /// Clear both rankings for everyone.
    Reset,
    /// List submissions waiting for a connection.
    Outbox,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PromptArg {
    A,
    B,
}

impl From<PromptArg> for Prompt {
    fn from(value: PromptArg) -> Self {
        match value {
            PromptArg::A => Prompt::A,
            PromptArg::B => Prompt::B,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let config = ClientConfig {
        server_url: cli.server,
        data_dir: cli.data_dir,
        ..ClientConfig::default()
    };
    let mut driver = Driver::new(&config)?;
    match cli.command {
        Commands::Watch { prompt } => watch(&mut driver, prompt.into()).await,
        Commands::SubmitA { items } => {
            connect_quietly(&mut driver).await;
            let outcome = driver.session_mut().submit_a(items, Instant::now());
            finish_submission(&mut driver, outcome).await
        }
        Commands::SubmitB { item } => {
            connect_quietly(&mut driver).await;
            let outcome = driver.session_mut().submit_b(item, Instant::now());
            finish_submission(&mut driver, outcome).await
        }
        Commands::Reset => {
            connect_quietly(&mut driver).await;
            match driver.session_mut().request_reset(Instant::now()) {
                ResetOutcome::LocalOnly => {
                    println!("offline: local view cleared, server not reset");
                }
                ResetOutcome::Pending(request) => {
                    let answers = driver.settle(SETTLE_LIMIT).await;
                    match answers.into_iter().find(|(id, _)| *id == request) {
                        Some((_, Completion::Failed(reason))) => {
                            eprintln!("reset failed: {reason}");
                        }
                        _ => println!("reset sent"),
                    }
                }
            }
            Ok(())
        }
        Commands::Outbox => {
            let outbox = driver.session().outbox();
            if outbox.is_empty() {
                println!("outbox empty");
            }
            for entry in outbox.entries() {
                let when = chrono::DateTime::from_timestamp_millis(entry.enqueued_at)
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| entry.enqueued_at.to_string());
                println!("{}  {}  {}  {}", entry.id, when, entry.event, entry.payload);
            }
            Ok(())
        }
    }
}

async fn connect_quietly(driver: &mut Driver) {
    match driver.connect().await {
        Ok(report) if report.sent > 0 => {
            println!("flushed {} queued submission(s)", report.sent);
        }
        Ok(_) => {}
        Err(err) => eprintln!("server unreachable ({err}), working offline"),
    }
}

async fn finish_submission(driver: &mut Driver, outcome: SubmitOutcome) -> Result<()> {
    let answers = driver.settle(SETTLE_LIMIT).await;
    match outcome {
        SubmitOutcome::Queued => println!("queued ({} waiting)", driver.session().outbox().len()),
        SubmitOutcome::Pending(request) => {
            match answers.into_iter().find(|(id, _)| *id == request) {
                Some((_, Completion::Failed(reason))) => eprintln!("rejected: {reason}"),
                Some((_, Completion::Requeued)) => {
                    println!("queued ({} waiting)", driver.session().outbox().len())
                }
                _ => println!("sent"),
            }
        }
    }
    Ok(())
}

async fn watch(driver: &mut Driver, prompt: Prompt) -> Result<()> {
    render(driver.session(), prompt);
    let follow = driver.watch(|session, event| match event {
        DriverEvent::Status(status) => eprintln!("[{}]", status.label()),
        DriverEvent::Snapshot(SnapshotOutcome::Applied) => render(session, prompt),
        DriverEvent::Snapshot(SnapshotOutcome::Discarded | SnapshotOutcome::Outdated) => {}
        DriverEvent::Flushed(report) => eprintln!("flushed {} queued submission(s)", report.sent),
        DriverEvent::Completed(_, Completion::Failed(reason)) => eprintln!("rejected: {reason}"),
        DriverEvent::Completed(..) => {}
    });
    tokio::select! {
        _ = follow => {}
        _ = tokio::signal::ctrl_c() => {}
    }
    Ok(())
}

fn render(session: &ClientSession<HttpTransport>, prompt: Prompt) {
    let version = session
        .cache()
        .current()
        .map(|snapshot| snapshot.meta.version)
        .unwrap_or(0);
    println!("--- {} v{} [{}] ---", prompt.as_str(), version, session.status().label());
    let items = session.cache().items(prompt);
    if items.is_empty() {
        println!("(no answers yet)");
    }
    for item in weigh(items) {
        println!("{:>4}  {:>2}px  {}", item.count, item.size, item.text);
    }
}
