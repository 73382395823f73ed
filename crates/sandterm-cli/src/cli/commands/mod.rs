pub mod config;
pub mod exec;
pub mod reset;
pub mod run;
pub mod session;
