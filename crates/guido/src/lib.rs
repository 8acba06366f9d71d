pub mod agent;
pub mod calendar;
pub mod configuration;
pub mod credentials;
pub mod errors;
pub mod factory;
pub mod mode;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod speech;
pub mod tools;
pub mod transcript;
pub mod web_search;
