//! 终端输出

mod cli;

pub use cli::{print_diagnostics, print_error_with_source};
