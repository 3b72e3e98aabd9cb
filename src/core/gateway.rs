use async_trait::async_trait;
use serenity::cache::Settings as CacheSettings;
use serenity::client::{Context, EventHandler};
use serenity::model::gateway::{GatewayIntents, Ready};
use serenity::Client;
use slog::Logger;

use crate::core::common::GatewayStarter;
use crate::error::{BootResult, StartupError};
use crate::prelude::*;

/// Fixed set of gateway subscriptions: ban events, membership events,
/// message events, plus access to message content. Moderation work
/// needs all four, so the set is not configurable.
pub const GATEWAY_INTENTS: GatewayIntents = GatewayIntents::GUILD_MODERATION
    .union(GatewayIntents::GUILD_MEMBERS)
    .union(GatewayIntents::GUILD_MESSAGES)
    .union(GatewayIntents::MESSAGE_CONTENT);

pub(crate) fn cache_settings() -> CacheSettings {
    let mut settings = CacheSettings::default();
    // keep every guild member cached, moderation lookups hit the
    // member list constantly
    settings.cache_users = true;
    settings
}

struct SessionNotifier {
    logger: Logger,
}

#[async_trait]
impl EventHandler for SessionNotifier {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(self.logger, "Gateway session established";
            "account" => ready.user.name.clone(),
            "guilds" => ready.guilds.len(),
        );
    }
}

/// Production starter backed by the serenity gateway client
pub struct DefaultGatewayStarter {
    logger: Logger,
}

impl DefaultGatewayStarter {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl GatewayStarter for DefaultGatewayStarter {
    type Session = Client;

    async fn start(&self, api_key: &str) -> BootResult<Client> {
        let notifier = SessionNotifier {
            logger: self.logger.clone(),
        };
        Client::builder(api_key, GATEWAY_INTENTS)
            .cache_settings(cache_settings())
            .event_handler(notifier)
            .await
            .map_err(StartupError::GatewayStartFailed)
    }
}
