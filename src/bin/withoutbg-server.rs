//! withoutbg background removal server
//!
//! HTTP service that removes image backgrounds with a local Tract model or
//! the withoutbg remote API.

#[cfg(feature = "cli")]
use withoutbg_server::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
