//! sk-worker CLI
//!
//! Notification-queue ingest worker: SQS in, decoded JSONL events out.

use clap::Parser;

mod args;
mod run;

use args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Logs go to stderr; stdout carries the decoded event stream.
    run::init_logging(args.log_level);

    let stats = run::execute(args).await?;

    eprintln!();
    eprintln!("Ingest summary:");
    eprintln!("  Messages received: {}", stats.messages_received);
    eprintln!("  Messages deleted:  {}", stats.messages_deleted);
    eprintln!("  Messages poisoned: {}", stats.messages_poisoned);
    eprintln!("  Records completed: {}", stats.records_completed);
    eprintln!("  Records failed:    {}", stats.records_failed);
    eprintln!("  Records aborted:   {}", stats.records_aborted);

    if stats.records_failed > 0 {
        // Failed records stay on the queue for redelivery; flag the run.
        std::process::exit(4);
    }

    Ok(())
}
