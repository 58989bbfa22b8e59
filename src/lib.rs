// depviz library: dependency metadata extraction, caching and graph rendering.

pub mod application;
pub mod common;
pub mod domain;
pub mod infrastructure;
pub mod ports;
