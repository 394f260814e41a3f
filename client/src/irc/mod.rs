pub mod connection;
pub mod formatter;
pub mod handler;
pub mod numerics;
pub mod parser;
pub mod sender;
