mod config;
mod core;
mod error;
mod logger;
mod prelude;

use crate::prelude::*;

#[tokio::main]
async fn main() -> UResult {
    let logger = configure_term_root();

    let mut app = Application::new()
        .logger(logger.clone())
        .config_path(DEFAULT_CONFIG_PATH)
        .database_opener(DefaultDatabaseOpener::new())
        .gateway_starter(DefaultGatewayStarter::new(logger.clone()))
        .build();

    app.bootstrap().await?;
    app.run().await?;

    Ok(())
}
