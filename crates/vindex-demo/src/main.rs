mod cli;
mod scenarios;

use clap::Parser;
use cli::{Cli, Scenario};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();

	tracing_subscriber::fmt()
		.with_max_level(if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
		.init();

	match cli.scenario.unwrap_or(Scenario::All) {
		Scenario::UniqueRace => scenarios::unique_race().await,
		Scenario::SortedRange => scenarios::sorted_range().await,
		Scenario::All => {
			scenarios::unique_race().await;
			scenarios::sorted_range().await;
		}
	}
}
