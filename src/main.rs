use clap::Parser;
use log::{error, info};
use rucher::configuration::config::Config;
use rucher::controller::controller_handler::Controller;
use std::path::Path;

#[derive(Parser)]
#[command(name = "rucher")]
#[command(version = "0.1.0")]
#[command(about = "A decoy network service with live attack observation")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(env = "RUCHER_CONFIG")]
    config_file: String,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    println!(
        "
██████╗ ██╗   ██╗ ██████╗██╗  ██╗███████╗██████╗
██╔══██╗██║   ██║██╔════╝██║  ██║██╔════╝██╔══██╗
██████╔╝██║   ██║██║     ███████║█████╗  ██████╔╝
██╔══██╗██║   ██║██║     ██╔══██║██╔══╝  ██╔══██╗
██║  ██║╚██████╔╝╚██████╗██║  ██║███████╗██║  ██║
╚═╝  ╚═╝ ╚═════╝  ╚═════╝╚═╝  ╚═╝╚══════╝╚═╝  ╚═╝
=================================================
A decoy service node with live attack observation
=================================================
"
    );

    let args = Args::parse();

    if args.config_file.is_empty() {
        error!("no configuration file given, exiting");
        std::process::exit(1);
    }

    info!("importing configuration from {}", args.config_file);
    let config = match Config::from_file(Path::new(args.config_file.as_str())) {
        Ok(config) => config,
        Err(e) => {
            error!("unable to import configuration: {:?}, exiting", e);
            std::process::exit(1);
        }
    };

    let mut controller = match Controller::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("unable to create the controller: {:?}, exiting", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = controller.run().await {
        error!("controller stopped with an error: {:?}", e);
        std::process::exit(1);
    }
}
