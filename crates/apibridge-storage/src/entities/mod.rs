pub mod apps;
pub mod call_logs;
pub mod credentials;
pub mod endpoints;
pub mod global_config;

pub use apps::Entity as Apps;
pub use call_logs::Entity as CallLogs;
pub use credentials::Entity as Credentials;
pub use endpoints::Entity as Endpoints;
pub use global_config::Entity as GlobalConfig;
