pub mod check;
pub mod log;
pub mod serve;
