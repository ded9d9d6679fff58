pub mod mock;
pub mod plan;
pub mod run;
