pub mod composer;
pub mod engine;
pub mod error;
pub mod filters;
pub mod request;
pub mod result_store;
pub mod runner;
