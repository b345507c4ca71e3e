pub mod agent;
pub mod errors;
pub mod instance;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod session;
pub mod tools;
