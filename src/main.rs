use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = frontgate::cli::Cli::parse();
    if let Err(e) = frontgate::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
