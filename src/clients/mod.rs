pub mod oracle_client;
pub mod schemas;

pub use oracle_client::{Oracle, OracleClient, OracleReply, UsageMeter};
