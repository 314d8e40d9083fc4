mod cli;

use actix_web::{App, HttpServer};
use clap::Parser;
use cli::{Cli, Command};
use log::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind } => {
            let engine = cli::load_config(cli.config.as_deref())?;
            info!("serving vecscan API on {} with {:?}", bind, engine);
            HttpServer::new(move || App::new().configure(vecscan::server::config_with(engine)))
                .bind(&bind)?
                .run()
                .await?;
        }
        command => {
            if let Err(e) = cli::execute(cli.config.as_deref(), command) {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
