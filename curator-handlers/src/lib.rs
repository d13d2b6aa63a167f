pub mod credentials;
pub mod easy_proxies;
pub mod heal_url;
pub mod hydrate_metadata;
pub mod import_urls;
pub mod pixiv_client;
pub mod proxy_probe;
pub mod request_log_cleanup;
