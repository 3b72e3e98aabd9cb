use async_trait::async_trait;

use crate::error::BootResult;

/// Seam between the startup sequence and the embedded database driver.
///
/// The application only ever asks for a connection by its locator
/// string; everything else about the driver stays behind this trait.
#[async_trait]
pub trait DatabaseOpener
where
    Self: Send + Sync,
{
    type Handle;

    async fn open(&self, locator: &str) -> BootResult<Self::Handle>;
}

/// Seam between the startup sequence and the chat gateway client.
///
/// Implementors receive the raw credential and hand back a session
/// that is connected or ready to connect.
#[async_trait]
pub trait GatewayStarter
where
    Self: Send + Sync,
{
    type Session;

    async fn start(&self, api_key: &str) -> BootResult<Self::Session>;
}
