use std::path::PathBuf;

use structopt::StructOpt;
use web3::types::Address;

#[derive(StructOpt)]
#[structopt(about = "Approval engine - run options")]
pub struct RunOptions {
    #[structopt(
        long = "simulate",
        help = "Wire in-process simulated wallet transports and drive a scripted session"
    )]
    pub simulate: bool,

    #[structopt(
        long = "keep-running",
        help = "Set to keep the engine running after the scripted session finishes"
    )]
    pub keep_running: bool,

    #[structopt(long = "http", help = "Enable http server")]
    pub http: bool,

    #[structopt(
        long = "http-threads",
        help = "Number of threads to use for the server",
        default_value = "2"
    )]
    pub http_threads: u64,

    #[structopt(
        long = "http-port",
        help = "Port number of the server",
        default_value = "8080"
    )]
    pub http_port: u16,

    #[structopt(
        long = "http-addr",
        help = "Bind address of the server",
        default_value = "127.0.0.1"
    )]
    pub http_addr: String,
}

#[derive(StructOpt)]
#[structopt(about = "Query the advisory service for tokens needing an allowance")]
pub struct CheckAdvisoryOptions {
    #[structopt(short = "c", long = "chain-name", default_value = "ethereum")]
    pub chain_name: String,

    #[structopt(short = "a", long = "wallet-address", help = "Wallet address to check")]
    pub wallet_address: String,
}

#[derive(StructOpt)]
#[structopt(about = "Encode ERC-20 approve calldata")]
pub struct EncodeApproveOptions {
    #[structopt(short = "s", long = "spender", help = "Spender address")]
    pub spender: Address,

    #[structopt(
        short = "a",
        long = "amount",
        help = "Amount (decimal, token base units)"
    )]
    pub amount: String,
}

#[derive(StructOpt)]
#[structopt(about = "Wallet approval engine")]
pub enum ApprovalCommands {
    Run {
        #[structopt(flatten)]
        run_options: RunOptions,
    },
    #[structopt(about = "Ask the advisory service which tokens need an allowance")]
    CheckAdvisory {
        #[structopt(flatten)]
        check_advisory_options: CheckAdvisoryOptions,
    },
    #[structopt(about = "Encode approve calldata without touching any wallet")]
    EncodeApprove {
        #[structopt(flatten)]
        encode_approve_options: EncodeApproveOptions,
    },
    #[structopt(about = "Validate the config file and print the resolved setup")]
    DecodeConfig,
}

#[derive(StructOpt)]
#[structopt(about = "Wallet approval engine")]
pub struct ApprovalOptions {
    #[structopt(
        long = "config",
        help = "Configuration file",
        default_value = "config-approval.toml"
    )]
    pub config: PathBuf,

    #[structopt(subcommand)]
    pub commands: ApprovalCommands,
}
