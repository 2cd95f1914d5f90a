use crate::app::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_TIMEOUT_SECS};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_NUMBER"));

#[derive(Parser, Debug)]
#[command(name = "kgw", version = VERSION, about = "Kaggle kernel runs watcher and pusher")]
pub struct Cli {
    /// Project root containing kaggle.yml (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scaffold kaggle.yml and kernel-metadata.json in the project root
    Init {
        /// Kernel slug (username/notebook-name)
        #[arg(short, long)]
        slug: Option<String>,
        /// Notebook or script file the kernel runs
        #[arg(short, long)]
        code_file: Option<String>,
    },
    /// Push the kernel, then wait for completion and download outputs
    Push {
        /// Trigger only; skip the poll-and-download wait
        #[arg(long)]
        no_wait: bool,
        /// Seconds between status checks (a 5-second floor applies)
        #[arg(short, long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
        interval: u64,
        /// Seconds before giving up on the wait
        #[arg(short, long, default_value_t = DEFAULT_POLL_TIMEOUT_SECS)]
        timeout: u64,
    },
    /// Print the resolved status of the latest logged run
    Status,
    /// Download kernel outputs into the configured directory
    Outputs,
    /// Submit a file to a competition
    Submit {
        /// Competition id (e.g. titanic)
        #[arg(short, long)]
        competition: String,
        /// Submission file
        #[arg(short, long)]
        file: PathBuf,
        /// Submission message
        #[arg(short, long, default_value = "Submission from kgw")]
        message: String,
    },
    /// Download a dataset into .kaggle-datasets/
    Dataset {
        /// Dataset ref (username/dataset-slug)
        dataset_ref: String,
    },
    /// Watch recent runs in the TUI (the default when no command is given)
    Watch,
}
