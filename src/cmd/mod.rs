//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`init`], [`validate`], [`health`], or
//! [`publish`]. Each handler lives in its own submodule.

pub mod health;
mod http;
pub mod init;
pub mod publish;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::BeaconError;

pub async fn dispatch(cli: Cli) -> Result<(), BeaconError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Init(ref args)) => init::execute(args),
        Some(Commands::Validate(ref args)) => validate::execute(args),
        Some(Commands::Health(args)) => health::execute(args).await,
        Some(Commands::Publish(args)) => publish::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  beacon v{version}: broadcast fan-out for WebSocket and long-poll clients\n\n  \
         No command provided. To get started:\n\n    \
         beacon init                    Generate a starter config\n    \
         beacon run                     Start the server (auto-detects ./beacon.yaml)\n    \
         beacon publish <ch> <json>     Publish through a running server\n    \
         beacon --help                  See all commands and options\n"
    );
}
