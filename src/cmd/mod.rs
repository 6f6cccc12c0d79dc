use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};

use crate::codec::OutputFormat;
use crate::context::ContextConfig;
use crate::storage::ObjectStoreConfig;
use crate::workload::wc::{Job, SplitPolicy};

/// Upper bound for `--partitions`.
pub const MAX_PARTITIONS: i64 = 1 << 16;
/// Upper bound for `--parallelism`.
pub const MAX_PARALLELISM: i64 = 1024;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,

    /// More log output (-v debug, -vv trace). RUST_LOG overrides this.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub context: ContextArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Count the words of the input and write them ordered by frequency
    Submit(SubmitArgs),
    /// Print the most frequent words of a finished job
    Show {
        /// Output directory of a finished job
        #[arg(short, long)]
        output: String,

        /// Record layout the job was written with
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,

        /// Number of words to print
        #[arg(short = 'k', long, default_value_t = 10)]
        top: usize,
    },
}

#[derive(ClapArgs, Debug)]
pub struct SubmitArgs {
    /// Input file, directory or glob (local path, file:// or s3://)
    #[arg(short, long)]
    pub input: String,

    /// Output directory; must not exist yet
    #[arg(short, long)]
    pub output: String,

    /// How lines are cut into words
    #[arg(long, value_enum, default_value_t)]
    pub split: SplitPolicy,

    /// Record layout of the output
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,

    /// Partitions for reading, shuffling and writing
    #[arg(
        short = 'n',
        long,
        env = "WCLITE_PARTITIONS",
        value_parser = clap::value_parser!(u32).range(1..=MAX_PARTITIONS)
    )]
    pub partitions: Option<u32>,
}

impl From<SubmitArgs> for Job {
    fn from(args: SubmitArgs) -> Self {
        Job {
            input: args.input,
            output: args.output,
            split: args.split,
            format: args.format,
            partitions: args.partitions.map(|n| n as usize),
        }
    }
}

/// Execution context settings shared by every command.
#[derive(ClapArgs, Debug)]
pub struct ContextArgs {
    /// Worker threads used to run pipeline stages (default: one per CPU)
    #[arg(
        long,
        env = "WCLITE_PARALLELISM",
        global = true,
        value_parser = clap::value_parser!(u32).range(0..=MAX_PARALLELISM)
    )]
    pub parallelism: Option<u32>,

    /// Endpoint of an S3-compatible object store, e.g. http://[::1]:9000
    #[arg(long, env = "WCLITE_S3_ENDPOINT", global = true)]
    pub s3_endpoint: Option<String>,

    /// Object store region
    #[arg(long, env = "WCLITE_S3_REGION", global = true)]
    pub s3_region: Option<String>,

    /// Object store access key
    #[arg(long, env = "WCLITE_S3_ACCESS_KEY", global = true, hide_env_values = true)]
    pub s3_access_key: Option<String>,

    /// Object store secret key
    #[arg(long, env = "WCLITE_S3_SECRET_KEY", global = true, hide_env_values = true)]
    pub s3_secret_key: Option<String>,
}

impl From<ContextArgs> for ContextConfig {
    fn from(args: ContextArgs) -> Self {
        ContextConfig {
            parallelism: args.parallelism.map(|n| n as usize),
            object_store: ObjectStoreConfig {
                endpoint: args.s3_endpoint,
                region: args.s3_region,
                access_key: args.s3_access_key,
                secret_key: args.s3_secret_key,
            },
            ..ContextConfig::default()
        }
    }
}
