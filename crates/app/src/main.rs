mod args;
mod commands;

use services::{AppController, Clock};
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::args::{Command, print_usage};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let invocation = args::parse(argv, |key| std::env::var(key).ok()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    if invocation.command == Command::Help {
        print_usage();
        return Ok(());
    }

    let settings = invocation.settings;
    debug!(
        db = %settings.db_url,
        intervals = ?settings.scheduler.table().as_slice(),
        max_review_count = settings.scheduler.max_review_count(),
        lapse_policy = %settings.scheduler.lapse_policy(),
        "opening store"
    );

    // Open + migrate SQLite here so the library crates stay free of filesystem concerns.
    args::prepare_sqlite_file(&settings.db_url)?;
    let mut controller =
        AppController::sqlite(&settings.db_url, Clock::default(), settings.scheduler.clone())
        .await?
        .with_page_size(settings.page_size);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    commands::execute(
        &mut controller,
        invocation.command,
        &settings,
        &mut stdin.lock(),
        &mut stdout.lock(),
    )
    .await
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
