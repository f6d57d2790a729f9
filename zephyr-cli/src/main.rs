//! Zephyr CLI - Command line interface
//!
//! Runs an entity script for a number of frames, checks it for compile
//! errors, or dumps its bytecode. Settings come from `zephyr.json` when
//! present; command line flags override them.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

mod config;
mod logging;
mod platform;

use crate::config::{json_to_value, parse_level, LogConfig, ProjectFile};
use crate::logging::{to_log_level, LogFormat, TracingSink};
use crate::platform::{print_diagnostics, print_error_with_source};
use zephyr_api::{
    init_config, CompiledScriptDefinition, EventArgs, FieldEntity, RunConfig, ScriptHost,
};
use zephyr_config::Phase;
use zephyr_core::{Chunk, OpCode};
use zephyr_log::Logger;

#[derive(Parser)]
#[command(
    name = "zephyr",
    about = "Zephyr entity scripting - run, check and dump state-machine scripts",
    version
)]
struct Cli {
    /// Project file (default: ./zephyr.json)
    #[arg(long, short, value_name = "CONFIG", default_value = "zephyr.json", global = true)]
    config: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    log_format: LogFormat,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Attach the script to one entity and simulate frames
    Run {
        /// Script file (default: the project's entry)
        script: Option<PathBuf>,
        /// Number of frames to simulate
        #[arg(long, short)]
        frames: Option<u32>,
        /// Log the disassembly of every chunk after compiling
        #[arg(long)]
        dump_bytecode: bool,
    },
    /// Compile the script and report diagnostics
    Check {
        script: Option<PathBuf>,
    },
    /// Print the bytecode of the script
    Dump {
        script: Option<PathBuf>,
        /// Only this chunk (`State.onUpdate`, `<init>` or `function Name`)
        #[arg(long)]
        chunk: Option<String>,
        /// JSON output
        #[arg(long)]
        json: bool,
    },
}

impl Command {
    fn script(&self) -> Option<&PathBuf> {
        match self {
            Command::Run { script, .. } | Command::Check { script } | Command::Dump { script, .. } => {
                script.as_ref()
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let (mut project, entry_path) = match load_project(&cli.config, cli.command.script()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    if let Some(level) = &cli.log_level {
        if parse_level(level).is_none() {
            eprintln!("Error: unknown log level '{}'", level);
            process::exit(1);
        }
        project.log_level = Some(level.clone());
    }

    let source = match std::fs::read_to_string(&entry_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!(
                "Error: Cannot read entry file '{}': {}",
                entry_path.display(),
                e
            );
            process::exit(1);
        }
    };

    let mut log_config = LogConfig::from_project(&project);
    if let Command::Run { dump_bytecode: true, .. } = &cli.command {
        // 反汇编以 Info 输出，至少让 compiler 阶段可见
        log_config.raise(Phase::Compiler, tracing::Level::INFO);
    }
    logging::init(&log_config, cli.log_format);

    let run_config = build_run_config(&project, &log_config, &cli.command);
    // Process-wide default for convenience; main is the only caller
    let _ = init_config(run_config);

    let name = script_name(&entry_path);
    tracing::info!(target: "zephyr::cli", script = %name, entry = %entry_path.display(), "loaded entry");

    match &cli.command {
        Command::Run { frames, .. } => {
            let frames = frames.or(project.frames).unwrap_or(1);
            handle_run(&name, &source, &project, frames);
        }
        Command::Check { .. } => handle_check(&name, &source),
        Command::Dump { chunk, json, .. } => handle_dump(&name, &source, chunk.as_deref(), *json),
    }
}

/// Read zephyr.json if present; an explicit script path overrides its entry
fn load_project(config: &Path, script: Option<&PathBuf>) -> Result<(ProjectFile, PathBuf), String> {
    match script {
        Some(path) => {
            let project = if config.exists() {
                ProjectFile::read(config)?
            } else {
                ProjectFile::default()
            };
            Ok((project, path.clone()))
        }
        None => {
            let project = ProjectFile::read(config)?;
            let entry = project.entry_path(config);
            Ok((project, entry))
        }
    }
}

fn script_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_string())
}

/// Build run configuration from the project file and flags
fn build_run_config(project: &ProjectFile, log_config: &LogConfig, command: &Command) -> RunConfig {
    let mut compiler = project.compiler.clone();
    if let Command::Run { dump_bytecode: true, .. } = command {
        compiler.dump_bytecode = true;
    }
    // 各阶段的过滤交给 tracing，这里只按最详细的阶段放行
    let logger = Logger::new(to_log_level(log_config.max_level())).with_sink(TracingSink);
    RunConfig::default()
        .with_compiler(compiler)
        .with_limits(project.limits.clone())
        .with_logger(logger)
}

/// `Print(a, b, ...)` writes to stdout; `Log(...)` goes to the CLI log target
fn register_natives(host: &mut ScriptHost) {
    fn join(args: &EventArgs) -> String {
        (0..)
            .map_while(|i| args.positional(i))
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    host.natives_mut().register("Print", |args: &EventArgs| {
        println!("{}", join(args));
        EventArgs::new()
    });
    host.natives_mut().register("Log", |args: &EventArgs| {
        tracing::info!(target: "zephyr::cli", "{}", join(args));
        EventArgs::new()
    });
}

fn load(host: &mut ScriptHost, name: &str, source: &str) -> Arc<CompiledScriptDefinition> {
    match host.load_script(name, source) {
        Ok(definition) => definition,
        Err(e) => {
            print_error_with_source(&e, source);
            process::exit(1);
        }
    }
}

fn handle_run(name: &str, source: &str, project: &ProjectFile, frames: u32) {
    let mut host = ScriptHost::with_global_config();
    register_natives(&mut host);
    load(&mut host, name, source);

    let mut entity = FieldEntity::new();
    for (field, value) in &project.entity {
        match json_to_value(value) {
            Some(value) => entity = entity.with_field(field.as_str(), value),
            None => tracing::warn!(target: "zephyr::cli", field = %field, "unsupported entity field value"),
        }
    }
    let mut values = EventArgs::new();
    for (key, value) in &project.values {
        if let Some(value) = json_to_value(value) {
            values.set(key.as_str(), value);
        }
    }

    let id = host.spawn_entity(entity);
    if let Err(e) = host.attach_script(id, name, values) {
        print_error_with_source(&e, source);
        process::exit(1);
    }

    for frame in 0..frames {
        tracing::debug!(target: "zephyr::cli", frame, state = host.current_state(id).unwrap_or(""), "update");
        host.update();
    }

    tracing::info!(
        target: "zephyr::cli",
        frames,
        state = host.current_state(id).unwrap_or(""),
        "simulation finished"
    );
}

fn handle_check(name: &str, source: &str) {
    let config = zephyr_api::get_config().cloned().unwrap_or_default();
    match zephyr_api::check(name, source, &config) {
        Ok(definition) => {
            println!(
                "✅ {}: {} states, {} functions",
                name,
                definition.states.len(),
                definition.functions.len()
            );
        }
        Err(e) => {
            print_diagnostics(e.diagnostics(), source);
            process::exit(1);
        }
    }
}

fn handle_dump(name: &str, source: &str, chunk: Option<&str>, json: bool) {
    let mut host = ScriptHost::with_global_config();
    let definition = load(&mut host, name, source);

    let names = match chunk {
        Some(chunk) => {
            if let Err(e) = host.dump_chunk(name, chunk) {
                print_error_with_source(&e, source);
                process::exit(1);
            }
            vec![chunk.trim().to_string()]
        }
        None => definition.chunk_names(),
    };
    let chunks: Vec<&Chunk> = names.iter().filter_map(|n| definition.chunk(n)).collect();

    if json {
        let output = serde_json::json!({
            "script": name,
            "initial_state": definition.initial_state(),
            "chunks": chunks.iter().map(|c| chunk_json(c)).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    } else {
        for chunk in chunks {
            println!("{}", chunk.disassemble());
        }
    }
}

/// One chunk as JSON: constants and decoded instructions
fn chunk_json(chunk: &Chunk) -> serde_json::Value {
    use serde_json::json;

    let mut code = Vec::new();
    let mut offset = 0;
    while offset < chunk.code.len() {
        let Ok(opcode) = OpCode::try_from(chunk.code[offset]) else {
            code.push(json!({ "offset": offset, "opcode": null, "byte": chunk.code[offset] }));
            offset += 1;
            continue;
        };
        let operands: Vec<i64> = match opcode {
            OpCode::And | OpCode::Or | OpCode::If | OpCode::Jump | OpCode::Loop => {
                vec![chunk.read_i16(offset + 1).unwrap_or(0) as i64]
            }
            _ => (0..opcode.operand_size())
                .map(|i| chunk.read_u8(offset + 1 + i).unwrap_or(0) as i64)
                .collect(),
        };
        code.push(json!({
            "offset": offset,
            "line": chunk.line_at(offset),
            "opcode": opcode.name(),
            "operands": operands,
        }));
        offset += 1 + opcode.operand_size();
    }

    json!({
        "name": chunk.name,
        "constants": chunk.constants.iter().map(|c| format!("{c:?}")).collect::<Vec<_>>(),
        "code": code,
    })
}
