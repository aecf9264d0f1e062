pub mod compactor;
pub mod config;
pub mod directory;
pub mod driver;
pub mod engine;
pub mod limits;
pub mod lock;
pub mod model;
pub mod observability;
pub mod wal;
