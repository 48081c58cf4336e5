pub mod cost;
pub mod graph;
pub mod mst;
pub mod reduce;
pub mod testing;
pub mod tree;
