pub mod operation;
pub mod order;
