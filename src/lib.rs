pub mod api_connection;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod error;
pub mod ingredient_extractor;
pub mod logging;
pub mod models;
pub mod optim;
pub mod render;
pub mod scale;
pub mod shopping;
pub mod suggest;
