pub mod insight_archive;
pub mod worker;
