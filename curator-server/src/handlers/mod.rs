pub mod authors;
pub mod healthz;
pub mod images;
pub mod metrics;
pub mod random;
pub mod serve;
pub mod tags;
pub mod version;
