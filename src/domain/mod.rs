pub mod entities;
pub mod error;
pub mod ports;
pub mod priority_graph;
pub mod values;
