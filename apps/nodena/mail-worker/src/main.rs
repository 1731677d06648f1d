//! Mail Worker Service - Entry Point
//!
//! Background worker that delivers NodeNA emails queued on Redis.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    nodena_mail_worker::run().await
}
