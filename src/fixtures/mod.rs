pub mod mappings;
pub mod snapshots;
