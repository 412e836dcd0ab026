pub mod experience;
pub mod market_data;
pub mod task;
