//! Command-line arguments for the demo binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "swapslot-demo")]
#[command(about = "Switches a pane between catalog entries faster than they load")]
pub struct Cli {
	/// Catalog entries to show, in order. Entries prefixed with `img:` use a
	/// content kind no factory handles; `broken:` entries fail to fetch.
	#[arg(default_values_t = ["cfg-a".to_string(), "cfg-b".to_string(), "cfg-c".to_string()])]
	pub items: Vec<String>,

	/// Delay between selections, in milliseconds
	#[arg(short, long, default_value_t = 20, value_name = "MS")]
	pub interval: u64,

	/// Simulated fetch latency, in milliseconds
	#[arg(short, long, default_value_t = 50, value_name = "MS")]
	pub fetch_delay: u64,

	/// TOML file with coordinator settings
	#[arg(short, long, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long)]
	pub verbose: bool,
}

impl Cli {
	pub fn interval(&self) -> Duration {
		Duration::from_millis(self.interval)
	}

	pub fn fetch_delay(&self) -> Duration {
		Duration::from_millis(self.fetch_delay)
	}
}
