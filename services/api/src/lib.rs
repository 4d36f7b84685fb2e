pub mod adapters;
pub mod config;
pub mod documents;
pub mod error;
pub mod privacy;
pub mod storage;
pub mod web;
