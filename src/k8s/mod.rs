pub mod client;
pub mod error;
pub mod labels;
pub mod namespace;
pub mod pods;
pub mod registry;
