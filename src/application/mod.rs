pub mod consensus;
pub mod coordinator;
pub mod dispatch;
pub mod experience_memory;
