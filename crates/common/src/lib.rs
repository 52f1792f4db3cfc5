pub mod batch;
pub mod calldata;
pub mod merkle_tree;
pub mod messages;
pub mod proof;
