pub mod common;
pub mod parser;
pub mod reader;

pub use common::*;
pub use parser::{parse_args, Args, ParsedConfig};

use clap::Parser;

use crate::error::ConfigError;

pub fn run() -> Result<ParsedConfig, ConfigError> {
    let args = Args::parse();
    parse_args(args)
}
