//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`init`], [`validate`], [`health`], or
//! [`backends`].
//! Each handler lives in its own submodule.

pub mod backends;
pub mod health;
pub mod init;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::FrontgateError;

pub async fn dispatch(cli: Cli) -> Result<(), FrontgateError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Init(ref args)) => init::execute(args),
        Some(Commands::Validate(ref args)) => validate::execute(args),
        Some(Commands::Health(args)) => health::execute(args).await,
        Some(Commands::Backends(args)) => backends::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  frontgate v{version} \u{2014} service-routing HTTP front end\n\n  \
         No command provided. To get started:\n\n    \
         frontgate init                    Generate a starter config\n    \
         frontgate run                     Start the proxy (reads ./frontgate.yaml)\n    \
         frontgate run -c services.yaml    Start with a specific config file\n    \
         frontgate backends                Serve demo backends for the config\n    \
         frontgate --help                  See all commands and options\n"
    );
}
