use std::path::PathBuf;
use clap::{Parser, Subcommand};
use crate::Config;

// Maximum worker threads accepted on the command line
const MAX_THREADS: usize = 256;

/// Pack files into ZIP archives and unpack them again
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Cli {
    /// Verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Write files and directories into a new archive
    Pack {
        /// Files or directories to add
        #[clap(required = true, value_parser)]
        inputs: Vec<PathBuf>,

        /// Archive to create
        #[clap(short, long, value_parser)]
        output: PathBuf,

        /// Store every entry without compression
        #[clap(long)]
        store: bool,

        /// Compress entries on a worker pool
        #[clap(long)]
        parallel: bool,

        /// Entries compressed at once (default: number of CPU cores)
        #[clap(short, long, default_value_t = num_cpus::get())]
        jobs: usize,

        /// Worker threads (default: number of CPU cores)
        #[clap(short, long, default_value_t = num_cpus::get())]
        threads: usize,

        /// Disable progress bar
        #[clap(short = 'P', long)]
        no_progress: bool,
    },

    /// Extract every entry of an archive
    Unpack {
        /// Archive to read
        #[clap(value_parser)]
        archive: PathBuf,

        /// Directory to extract into
        #[clap(short = 'd', long, value_parser, default_value = ".")]
        directory: PathBuf,
    },

    /// Show the entries of an archive
    List {
        /// Archive to read
        #[clap(value_parser)]
        archive: PathBuf,

        /// Print the listing as JSON
        #[clap(long)]
        json: bool,
    },
}

impl Cli {
    /// Converts CLI arguments into a Config
    pub fn into_config(&self) -> Config {
        let mut config = Config {
            verbose: self.verbose,
            ..Config::default()
        };

        if let Command::Pack {
            store,
            parallel,
            jobs,
            threads,
            ..
        } = &self.command
        {
            config.compress_when_possible = !store;
            config.parallel = *parallel;
            config.max_concurrency = *jobs;
            config.thread_count = *threads;
        }
        config
    }

    /// Validates the arguments before any work starts
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::Pack {
                inputs,
                jobs,
                threads,
                ..
            } => {
                for input in inputs {
                    if !input.exists() {
                        return Err(format!("Input does not exist: {:?}", input));
                    }
                }

                if *jobs == 0 {
                    return Err("Job count must be greater than 0".to_string());
                }
                if *threads == 0 {
                    return Err("Thread count must be greater than 0".to_string());
                }
                if *threads > MAX_THREADS {
                    return Err(format!("Thread count must not exceed {}", MAX_THREADS));
                }
            }
            Command::Unpack { archive, .. } | Command::List { archive, .. } => {
                if !archive.exists() {
                    return Err(format!("Archive does not exist: {:?}", archive));
                }
                if !archive.is_file() {
                    return Err(format!("Archive path is not a file: {:?}", archive));
                }
            }
        }

        Ok(())
    }
}
