pub mod enemy;
pub mod entity;
pub mod graph;
pub mod rock;
