pub mod cascade;
pub mod config;
pub mod dataset;
pub mod error;
pub mod grid_search;
pub mod model;
pub mod parse;
pub mod partition;
pub mod pipeline;
pub mod scoring;
pub mod support_vector_machine;
