pub mod bot;
pub mod config;
pub mod domain;
pub mod error;
pub mod integrations;
pub mod messages;
pub mod payments;
pub mod repository;
pub mod service;
