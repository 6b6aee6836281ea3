use kestrel_router::{NullAlertSink, NullTradeStore};
use kestrel_runner::{PaperBroker, TradingApp, TradingConfig};
use kestrel_strategy::{NaiveTestStrategy, StrategyRegistry};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: kestrel <config.json>");
            return ExitCode::FAILURE;
        }
    };
    let config = match TradingConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut registry = StrategyRegistry::new();
    registry.register(NaiveTestStrategy::NAME, || {
        Box::new(NaiveTestStrategy::new())
    });

    let app = match TradingApp::new(
        config,
        &registry,
        Arc::new(PaperBroker::new()),
        Arc::new(NullTradeStore),
        Arc::new(NullAlertSink),
    ) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("failed to assemble engine: {}", e);
            return ExitCode::FAILURE;
        }
    };

    app.run().await;
    ExitCode::SUCCESS
}
