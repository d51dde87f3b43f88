use anyhow::Context;
use clap::Parser;
use listing_map::domain::ports::{DisplayTree, MapSettings};
use listing_map::utils::{logger, validation::Validate};
use listing_map::{
    CliArgs, ConfiguredFeed, HeadlessProvider, InMemoryDisplayTree, MapView, ProviderLoader,
    ViewEvent, ViewSurfaces, Viewport,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct StepSummary {
    step: String,
    filters: String,
    listings: usize,
    markers: Vec<String>,
    viewport: Option<Viewport>,
    presentation: String,
    host_parent: Option<String>,
    notices: Vec<String>,
}

fn summarize<F: listing_map::core::DataFeed>(
    step: &str,
    view: &MapView<F>,
    tree: &InMemoryDisplayTree,
    host: listing_map::NodeId,
) -> StepSummary {
    let filters = view
        .filters()
        .to_query_pairs()
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    StepSummary {
        step: step.to_string(),
        filters,
        listings: view.items().len(),
        markers: view.marker_ids().into_iter().collect(),
        viewport: view.viewport(),
        presentation: format!("{:?}", view.context()),
        host_parent: tree.parent_of(host).and_then(|p| tree.label(p)),
        notices: view.notices().iter().map(|n| n.message()).collect(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    if args.log_json {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting listing-map session");

    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }
    if args.verbose {
        tracing::debug!("Resolved config: {:?}", config);
    }

    let tree = Arc::new(InMemoryDisplayTree::new());
    let root = tree.root();
    let page = tree.append(root, "listings-page")?;
    let panel = tree.append(page, "map-panel")?;
    let host = tree.append(panel, "map-host")?;
    tree.append(panel, "map-legend")?;
    let placeholder = tree.append(page, "map-placeholder")?;
    let overlay = tree.append(root, "fullscreen-layer")?;

    let provider = if config.interactive() {
        HeadlessProvider::new()
    } else {
        HeadlessProvider::new().non_interactive()
    };
    let loader = Arc::new(ProviderLoader::new(Arc::new(provider)));
    let feed = ConfiguredFeed::from_config(&config).context("building listing feed")?;

    let mut view = MapView::new(
        &config,
        loader,
        tree.clone(),
        ViewSurfaces {
            host,
            overlay,
            placeholder,
        },
        feed,
        config.initial_query(),
    );

    let mut steps = Vec::new();

    view.start().await;
    steps.push(summarize("start", &view, &tree, host));

    let filter_steps = args
        .filter_steps(view.filters())
        .context("parsing --filter arguments")?;
    for (i, filters) in filter_steps.into_iter().enumerate() {
        view.handle(ViewEvent::FiltersChanged(filters)).await;
        steps.push(summarize(&format!("filter #{}", i + 1), &view, &tree, host));
    }

    if let Some(id) = &args.focus {
        if !view.focus(id) {
            tracing::warn!("Listing {} is not on the map", id);
        }
        steps.push(summarize(&format!("focus {}", id), &view, &tree, host));
    }

    if args.fullscreen {
        view.handle(ViewEvent::ToggleFullscreen).await;
        view.settle().await;
        steps.push(summarize("fullscreen", &view, &tree, host));

        view.handle(ViewEvent::KeyPressed("Escape".to_string())).await;
        view.settle().await;
        steps.push(summarize("escape", &view, &tree, host));
    }

    tracing::info!(
        "Session finished with {} markers (close-up zoom {})",
        view.marker_ids().len(),
        config.close_up_zoom()
    );
    view.teardown();

    println!("{}", serde_json::to_string_pretty(&steps)?);
    Ok(())
}
