pub mod fenced;
pub mod in_memory;
pub mod interface;
