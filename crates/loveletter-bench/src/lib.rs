pub mod analytics;
pub mod config;
pub mod logging;
pub mod seat;
pub mod trial;
pub mod winner;
