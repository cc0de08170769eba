pub mod cli;
pub mod conformance;
pub mod config;
pub mod context;
pub mod credentials;
pub mod k8s;
pub mod logging;
pub mod runner;
