use clap::Args;
use tokio::sync::broadcast::error::RecvError;

use super::{open_app, print_event, CliResult};

#[derive(Args)]
pub struct RunArgs {
    /// Start the countdown right away
    #[arg(long)]
    start: bool,
}

pub fn run(args: RunArgs) -> CliResult {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_loop(args))
}

async fn run_loop(args: RunArgs) -> CliResult {
    let mut app = open_app()?;
    let mut events = app.subscribe();

    if let Some(event) = app.restored() {
        print_event(event)?;
    }
    if args.start {
        app.timer_start();
    }
    app.spawn_all();
    tracing::info!("running, press Ctrl-C to stop");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    tracing::error!("failed to listen for Ctrl-C: {e}");
                }
                break;
            }
            received = events.recv() => match received {
                Ok(event) => print_event(&event)?,
                Err(RecvError::Lagged(skipped)) => tracing::warn!("skipped {skipped} events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    app.shutdown();
    Ok(())
}
