//! e-CF Worker Service Entry Point
//!
//! Loads `.env` when present, then hands over to [`ecf_worker::run`].

use ecf_worker::run;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment and config files still apply.
    let _ = dotenvy::dotenv();
    run().await
}
