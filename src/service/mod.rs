pub mod recommend;
pub mod stats;
