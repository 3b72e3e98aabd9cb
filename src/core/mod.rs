pub mod application;
pub mod common;
pub mod database;
pub mod gateway;

pub use application::{Application, DEFAULT_CONFIG_PATH};
pub use database::DefaultDatabaseOpener;
pub use gateway::DefaultGatewayStarter;
