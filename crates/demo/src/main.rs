//! Demo driver for the swapslot pane coordinator.
//!
//! Selects each catalog entry in turn, faster than entries load, then tears
//! the pane down and prints what happened.

mod catalog;
mod cli;

use std::sync::Arc;

use anyhow::Context;
use catalog::{CatalogFetcher, Entry, Surface, SurfaceReleaser, TextSurfaces};
use clap::Parser;
use cli::Cli;
use swapslot_pane::{CoordinatorConfig, DisplayState, FactoryRegistry, RequestCoordinator};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	let default_level = if cli.verbose { "debug" } else { "info" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
	tracing_subscriber::fmt().with_env_filter(filter).init();

	let config = match &cli.config {
		Some(path) => {
			let src = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
			CoordinatorConfig::from_toml(&src).with_context(|| format!("parsing {}", path.display()))?
		}
		None => CoordinatorConfig::default(),
	};

	let releaser = Arc::new(SurfaceReleaser::default());
	let factories: FactoryRegistry<Entry, Surface> = FactoryRegistry::new().with("text", TextSurfaces::default());
	let (tx, mut rx) = mpsc::unbounded_channel::<DisplayState<String, Surface>>();
	let coordinator = RequestCoordinator::new(config, CatalogFetcher::new(cli.fetch_delay()), factories, Arc::clone(&releaser), tx);

	let printer = tokio::spawn(async move {
		while let Some(state) = rx.recv().await {
			match state {
				DisplayState::Empty => println!("[pane] empty"),
				DisplayState::Loading { item } => println!("[pane] loading {item}"),
				DisplayState::Content { item, handle } => println!("[pane] showing {item} on surface #{}", handle.id),
				DisplayState::Error { item, message } => println!("[pane] error for {}: {message}", item.as_deref().unwrap_or("-")),
			}
		}
	});

	for item in cli.items.iter().cloned() {
		let generation = coordinator.show(item.clone()).await?;
		info!(%generation, %item, "demo.selected");
		tokio::time::sleep(cli.interval()).await;
	}
	coordinator.settle().await;

	coordinator.dispose().await?;
	let stats = coordinator.stats();
	drop(coordinator);
	printer.await.context("display printer task")?;

	println!(
		"created {} / released {} (release failures {}, stale {}, fetch failures {}, create failures {})",
		stats.created, stats.released, stats.release_failures, stats.stale_discards, stats.fetch_failures, stats.create_failures
	);
	anyhow::ensure!(releaser.released() == stats.created, "leaked {} surfaces", stats.created.saturating_sub(releaser.released()));
	Ok(())
}
