pub mod dispatch;
pub mod schedule;
pub mod sync;
