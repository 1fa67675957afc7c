pub mod atomic;
pub mod backup;
