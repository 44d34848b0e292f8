pub mod file_ctx;
pub mod header_flow;

pub use file_ctx::FileCtx;
pub use header_flow::{HeaderDone, HeaderFlow, HeaderSource};
