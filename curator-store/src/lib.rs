pub mod api_keys;
pub mod audit;
pub mod authors;
pub mod images;
pub mod imports;
pub mod jobs;
pub mod pool;
pub mod proxies;
pub mod proxy_uri;
pub mod request_logs;
pub mod settings;
pub mod tags;
pub mod tokens;
pub mod vault;

pub use pool::connect;
pub use vault::Vault;
