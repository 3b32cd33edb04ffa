pub mod holds;
pub mod realtime;
