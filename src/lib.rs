pub mod aggregate;
pub mod auth;
pub mod config;
pub mod domain;
pub mod mail;
pub mod ranking;
pub mod sources;
pub mod terminal;
