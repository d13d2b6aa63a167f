pub mod client;
pub mod failover;
pub mod fetch;
pub mod pixiv_urls;
pub mod select;
pub mod token_cache;
