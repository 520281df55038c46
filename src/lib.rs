pub mod backend;
pub mod cli;
pub mod http;
pub mod model;
pub mod repo;
pub mod session;
pub mod upload;
pub mod utils;
pub mod views;
