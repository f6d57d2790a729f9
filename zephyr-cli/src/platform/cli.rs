//! CLI 格式化输出
//!
//! 提供命令行友好的错误显示和源码上下文打印。

use zephyr_api::{CompileError, ZephyrError};

/// 错误行前后显示的上下文行数
const CONTEXT_LINES: usize = 2;

/// 打印错误并显示源代码上下文
pub fn print_error_with_source(e: &ZephyrError, source: &str) {
    match e {
        ZephyrError::Compile(errors) => print_diagnostics(errors, source),
        other => eprintln!("❌ {}", other.to_report()),
    }
}

/// 逐条打印编译诊断
pub fn print_diagnostics(errors: &[CompileError], source: &str) {
    for error in errors {
        eprintln!("❌ {}", error);
        if error.line > 0 {
            print_source_context(source, error.line, error.column);
        }
    }
    eprintln!("{} error(s)", errors.len());
}

/// 打印源代码上下文（显示错误行前后几行）
pub fn print_source_context(source: &str, error_line: usize, error_col: usize) {
    let lines: Vec<&str> = source.lines().collect();
    let total_lines = lines.len();

    if error_line == 0 || error_line > total_lines {
        return;
    }

    let start_line = error_line.saturating_sub(CONTEXT_LINES).max(1);
    let end_line = (error_line + CONTEXT_LINES).min(total_lines);
    let width = end_line.to_string().len();

    eprintln!("{}|--", "-".repeat(width + 1));
    for line_idx in start_line..=end_line {
        eprintln!("{:>width$} | {}", line_idx, lines[line_idx - 1]);
        if line_idx == error_line {
            // 指向错误位置
            let marker = " ".repeat(error_col.saturating_sub(1));
            eprintln!("{} | {}^", " ".repeat(width), marker);
        }
    }
    eprintln!("{}|--", "-".repeat(width + 1));
}
