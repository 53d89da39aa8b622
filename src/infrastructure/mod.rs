//! Infrastructure layer - storage, activities, audit and workflow runtime

pub mod activity;
pub mod audit;
pub mod logging;
pub mod observability;
pub mod storage;
pub mod workflow;
