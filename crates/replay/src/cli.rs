use std::path::PathBuf;

use clap::Parser;

use ledgerpost_observability::LogFormat;

#[derive(Parser)]
#[command(
    name = "ledgerpost-replay",
    about = "Replay document change events into an in-memory ledger",
    version,
)]
pub struct Cli {
    /// Replay config (businesses, products). Defaults to $LEDGERPOST_CONFIG,
    /// then ./ledgerpost.toml.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Change events, one JSON object per line.
    #[arg(short, long)]
    pub events: PathBuf,

    #[arg(long, default_value = "pretty")]
    pub log_format: LogArg,

    /// Include every journal and stock row in the summary.
    #[arg(long)]
    pub dump_ledgers: bool,
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
pub enum LogArg {
    Json,
    Pretty,
}

impl From<LogArg> for LogFormat {
    fn from(value: LogArg) -> Self {
        match value {
            LogArg::Json => LogFormat::Json,
            LogArg::Pretty => LogFormat::Pretty,
        }
    }
}
