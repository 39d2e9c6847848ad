pub mod assessments;
pub mod db;
pub mod events;
pub mod models;
pub mod rankings;
pub mod schema;
pub mod scoring_configs;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
