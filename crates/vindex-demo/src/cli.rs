use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "vindex-demo")]
#[command(about = "Walks through the secondary-indexing core's commit and query scenarios")]
#[command(version)]
pub struct Cli {
	#[command(subcommand)]
	pub scenario: Option<Scenario>,

	/// Verbose logging
	#[arg(short, long)]
	pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum Scenario {
	/// Two grains race to claim the same unique key; the loser's commit fails.
	UniqueRace,
	/// A sorted index spanning several date-time partitions is queried by range.
	SortedRange,
	/// Runs every scenario in turn (default when no subcommand is given).
	All,
}
