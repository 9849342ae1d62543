pub mod common;
pub mod cursor;
pub mod reconcile;
pub mod replicate;
