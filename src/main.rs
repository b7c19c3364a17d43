use clap::Parser;

use codegraph_core::cli::{run, Cli};
use codegraph_core::logging;

#[tokio::main]
async fn main() {
    logging::init("CODEGRAPH_");
    let cli = Cli::parse();
    let exit = run(cli).await;
    std::process::exit(exit.code());
}
