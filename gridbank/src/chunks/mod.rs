pub mod head;
pub mod node;
