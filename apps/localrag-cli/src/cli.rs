use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "localrag", about = "Answer questions grounded in a local document collection")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the corpus, build the index and persist it as the active snapshot.
    Ingest {
        /// Corpus directory; defaults to `corpus.dir` from the configuration.
        dir: Option<PathBuf>,
    },

    /// Answer a question from the active snapshot.
    Ask {
        question: String,
        /// Print the full result (answer, citations, sources) as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Time retrieval and generation for every question in a file.
    Eval {
        /// One question per non-empty line.
        file: PathBuf,
        /// Where to write the JSON report.
        #[arg(long, default_value = "eval_log.json")]
        log: PathBuf,
    },

    /// Show the active snapshot.
    Status,
}
