pub mod app;
pub mod auth;
pub mod campaigns;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod state;
pub mod storage;
pub mod users;
pub mod validators;
