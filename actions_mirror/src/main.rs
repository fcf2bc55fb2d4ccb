mod analyzer;
mod cli;
mod conf;
mod github;
mod gitlab;
mod journal;
mod locator;
mod models;
mod monitor;
mod report;
mod status;
mod tracker;


use human_panic::setup_panic;
use polyfmt::error;

const BUILD_SEMVER: &str = env!("BUILD_SEMVER");
const BUILD_COMMIT: &str = env!("BUILD_COMMIT");

#[tokio::main(flavor = "current_thread")]
async fn main() {
    setup_panic!();

    let cli = match cli::Cli::new() {
        Ok(cli) => cli,
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(1)
        }
    };

    match cli.run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(1)
        }
    }
}
