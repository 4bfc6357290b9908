//! Loading demo
//!
//! Runs `PagedLoading` or `Loading` against a simulated backend and prints
//! every public state and error event as it happens.
//!
//! ```text
//! loading-demo paged --page-size 5 --pages 3 --fail-on-page 2
//! RUST_LOG=loading=debug loading-demo single --fail-first
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use loading::{
    FnLoader, Loading, LoadingConfig, LoadingState, PageFnLoader, PagedLoading, PagedState,
    PagingInfo,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "loading-demo")]
#[command(about = "Drive the loading state machines against a simulated backend")]
struct Cli {
    /// Simulated latency of every fetch, in milliseconds
    #[arg(long, global = true, default_value_t = 150)]
    latency_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Page through a catalog until it is exhausted, then refresh
    Paged {
        #[arg(long, default_value_t = 5)]
        page_size: usize,

        /// Number of non-empty pages the backend serves
        #[arg(long, default_value_t = 3)]
        pages: usize,

        /// Fail the first attempt at this page (1-based)
        #[arg(long)]
        fail_on_page: Option<usize>,
    },

    /// Load a single value, then refresh it
    Single {
        /// Fail the first load
        #[arg(long)]
        fail_first: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,loading=debug,dataflow_loop=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = LoadingConfig::from_env().context("Invalid loading configuration")?;
    let latency = Duration::from_millis(cli.latency_ms);

    tracing::info!(
        event_capacity = config.event_capacity,
        state_capacity = config.state_capacity,
        "Starting loading demo"
    );

    match cli.command {
        Commands::Paged {
            page_size,
            pages,
            fail_on_page,
        } => run_paged(config, latency, page_size, pages, fail_on_page).await,
        Commands::Single { fail_first } => run_single(config, latency, fail_first).await,
    }
}

// ============================================================================
// Paged
// ============================================================================

async fn run_paged(
    config: LoadingConfig,
    latency: Duration,
    page_size: usize,
    pages: usize,
    fail_on_page: Option<usize>,
) -> Result<()> {
    let total = page_size * pages;
    let failed_once = Arc::new(AtomicBool::new(false));

    let loader = PageFnLoader::new(move |paging: PagingInfo<usize>| {
        let failed_once = failed_once.clone();
        async move {
            tokio::time::sleep(latency).await;

            let page = paging.page_count + 1;
            if fail_on_page == Some(page) && !failed_once.swap(true, Ordering::SeqCst) {
                anyhow::bail!("backend unavailable while serving page {}", page);
            }

            let start = paging.data.len();
            Ok::<Vec<usize>, anyhow::Error>((start..total.min(start + page_size)).collect())
        }
    });

    let feed = PagedLoading::builder(loader).config(config).build();

    let mut states = feed.states();
    let printer = tokio::spawn(async move {
        while let Some(state) = states.next().await {
            println!("state: {}", describe_paged(&state));
        }
    });
    let errors = feed.handle_errors(|error, has_data| {
        println!("event: error {:?} (data kept: {})", error.to_string(), has_data);
    });

    let mut driver = feed.states();
    feed.start(true).await?;

    let mut refreshed = false;
    while let Some(state) = driver.next().await {
        match &state {
            PagedState::Loading => {}
            _ if in_flight(&state) => {}
            PagedState::Error(_) => {
                tracing::info!("First page failed, restarting");
                feed.restart(true);
            }
            PagedState::Empty => {
                tracing::warn!("Backend has no data");
                break;
            }
            PagedState::Data { .. } if refreshed => break,
            PagedState::Data { .. } if state.can_load_more() => feed.load_more(),
            PagedState::Data { .. } => {
                refreshed = true;
                feed.refresh();
            }
        }
    }

    tracing::info!(items = feed.state().items().map_or(0, |i| i.len()), "Paged demo finished");
    feed.shutdown();
    drop(feed);
    printer.await?;
    errors.await?;
    Ok(())
}

fn in_flight<T>(state: &PagedState<T>) -> bool {
    state.is_refreshing() || state.is_loading_more()
}

fn describe_paged(state: &PagedState<usize>) -> String {
    match state {
        PagedState::Empty => "empty".to_string(),
        PagedState::Loading => "loading".to_string(),
        PagedState::Error(error) => format!("error ({})", error),
        PagedState::Data {
            page_count,
            data,
            status,
        } => format!(
            "{} page(s), {} item(s), {:?}",
            page_count,
            data.len(),
            status
        ),
    }
}

// ============================================================================
// Single
// ============================================================================

async fn run_single(config: LoadingConfig, latency: Duration, fail_first: bool) -> Result<()> {
    let failed_once = Arc::new(AtomicBool::new(!fail_first));
    let version = Arc::new(AtomicUsize::new(0));

    let loader = FnLoader::new(move |fresh: bool| {
        let failed_once = failed_once.clone();
        let version = version.clone();
        async move {
            tokio::time::sleep(latency).await;
            if !failed_once.swap(true, Ordering::SeqCst) {
                anyhow::bail!("profile service timed out");
            }
            let n = version.fetch_add(1, Ordering::SeqCst) + 1;
            Ok::<_, anyhow::Error>(Some(format!("profile v{} (fresh: {})", n, fresh)))
        }
    });

    let profile = Loading::builder(loader).config(config).build();

    let mut states = profile.states();
    let printer = tokio::spawn(async move {
        while let Some(state) = states.next().await {
            println!("state: {}", describe_single(&state));
        }
    });
    let errors = profile.handle_errors(|error, has_data| {
        println!("event: error {:?} (data kept: {})", error.to_string(), has_data);
    });

    let mut driver = profile.states();
    profile.start(false).await?;

    let mut refreshes = 0;
    while let Some(state) = driver.next().await {
        match state {
            LoadingState::Loading | LoadingState::Data { refreshing: true, .. } => {}
            LoadingState::Error(_) => profile.restart(true),
            LoadingState::Empty => break,
            LoadingState::Data { .. } if refreshes < 2 => {
                refreshes += 1;
                profile.refresh();
            }
            LoadingState::Data { .. } => break,
        }
    }

    tracing::info!("Single demo finished");
    profile.shutdown();
    drop(profile);
    printer.await?;
    errors.await?;
    Ok(())
}

fn describe_single(state: &LoadingState<String>) -> String {
    match state {
        LoadingState::Empty => "empty".to_string(),
        LoadingState::Loading => "loading".to_string(),
        LoadingState::Error(error) => format!("error ({})", error),
        LoadingState::Data { data, refreshing } => {
            format!("{:?}{}", data, if *refreshing { " (refreshing)" } else { "" })
        }
    }
}
