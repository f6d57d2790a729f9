//! CLI 配置
//!
//! 项目文件 `zephyr.json` 和分阶段日志配置

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::Level;
use zephyr_api::{CompilerConfig, LimitConfig, Vec2, Vec3, ZephyrValue};
use zephyr_config::Phase;

/// zephyr.json 结构
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProjectFile {
    /// 入口脚本路径（相对于项目文件）
    pub entry: String,
    /// `run` 模拟的帧数
    pub frames: Option<u32>,
    pub compiler: CompilerConfig,
    pub limits: LimitConfig,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    pub log_level: Option<String>,
    /// 分阶段日志级别，键为 lexer / compiler / vm / runtime
    pub phases: BTreeMap<String, String>,
    /// 实体字段初值
    pub entity: BTreeMap<String, serde_json::Value>,
    /// 脚本实例变量初值
    pub values: BTreeMap<String, serde_json::Value>,
}

impl ProjectFile {
    /// 读取并解析项目文件
    pub fn read(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Err(format!(
                "未找到 '{}'\n\n提示: 创建 '{}' 文件并指定 'entry' 字段，或直接传入脚本路径",
                path.display(),
                path.display()
            ));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("无法读取 '{}': {}", path.display(), e))?;

        let project: ProjectFile = serde_json::from_str(&content)
            .map_err(|e| format!("解析 '{}' 失败: {}", path.display(), e))?;

        if project.entry.is_empty() {
            return Err(format!("'{}' 中的 'entry' 字段不能为空", path.display()));
        }
        Ok(project)
    }

    /// 入口路径相对于项目文件所在目录
    pub fn entry_path(&self, project_path: &Path) -> PathBuf {
        let base_dir = project_path.parent().unwrap_or(Path::new("."));
        base_dir.join(&self.entry)
    }
}

/// JSON 值转换为脚本值；数组按长度转为 vec2 / vec3
pub fn json_to_value(value: &serde_json::Value) -> Option<ZephyrValue> {
    match value {
        serde_json::Value::Null => Some(ZephyrValue::NONE),
        serde_json::Value::Bool(b) => Some(ZephyrValue::Bool(*b)),
        serde_json::Value::Number(n) => n.as_f64().map(|n| ZephyrValue::Number(n as f32)),
        serde_json::Value::String(s) => Some(ZephyrValue::String(s.clone())),
        serde_json::Value::Array(items) => {
            let numbers: Option<Vec<f32>> = items
                .iter()
                .map(|v| v.as_f64().map(|n| n as f32))
                .collect();
            match numbers?.as_slice() {
                [x, y] => Some(ZephyrValue::Vec2(Vec2::new(*x, *y))),
                [x, y, z] => Some(ZephyrValue::Vec3(Vec3::new(*x, *y, *z))),
                _ => None,
            }
        }
        serde_json::Value::Object(_) => None,
    }
}

/// 解析日志级别字符串
pub fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "silent" | "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

/// CLI 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub global: Level,
    pub lexer: Option<Level>,
    pub compiler: Option<Level>,
    pub vm: Option<Level>,
    pub runtime: Option<Level>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: Level::WARN,
            lexer: None,
            compiler: None,
            vm: None,
            runtime: None,
        }
    }
}

impl LogConfig {
    pub fn from_project(project: &ProjectFile) -> Self {
        let phase = |name: &str| project.phases.get(name).and_then(|s| parse_level(s));
        Self {
            global: project
                .log_level
                .as_deref()
                .and_then(parse_level)
                .unwrap_or(Level::WARN),
            lexer: phase("lexer"),
            compiler: phase("compiler"),
            vm: phase("vm"),
            runtime: phase("runtime"),
        }
    }

    /// Get log level for a specific phase
    pub fn level_for(&self, phase: Phase) -> Level {
        let level = match phase {
            Phase::Lexer => self.lexer,
            Phase::Compiler => self.compiler,
            Phase::Vm => self.vm,
            Phase::Runtime => self.runtime,
        };
        level.unwrap_or(self.global)
    }

    /// Make `phase` at least as verbose as `level`
    pub fn raise(&mut self, phase: Phase, level: Level) {
        if self.level_for(phase) >= level {
            return;
        }
        let slot = match phase {
            Phase::Lexer => &mut self.lexer,
            Phase::Compiler => &mut self.compiler,
            Phase::Vm => &mut self.vm,
            Phase::Runtime => &mut self.runtime,
        };
        *slot = Some(level);
    }

    /// The most verbose level any phase asks for
    pub fn max_level(&self) -> Level {
        [Phase::Lexer, Phase::Compiler, Phase::Vm, Phase::Runtime]
            .into_iter()
            .map(|p| self.level_for(p))
            .fold(self.global, |a, b| if b > a { b } else { a })
    }
}
