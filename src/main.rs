use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = beacon::cli::Cli::parse();
    if let Err(e) = beacon::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
