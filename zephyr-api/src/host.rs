//! 脚本宿主
//!
//! 持有脚本注册表、原生处理器、实体表和所有脚本实例，
//! 对外提供加载、挂载、逐帧更新、事件分派和热重载。

use crate::config::RunConfig;
use crate::error::ZephyrError;
use std::collections::BTreeMap;
use std::sync::Arc;
use zephyr_core::{
    CompiledScriptDefinition, EntityId, EntityRegistry, EventArgs, EventBridge, ExecutionEnv,
    ScriptEntity, ScriptInstance, ScriptRegistry, ZephyrValue,
};
use zephyr_log::{debug, info, Logger};

/// 拆分借用：实例表之外的部分组成执行环境
macro_rules! host_env {
    ($host:expr) => {
        ExecutionEnv {
            natives: &$host.natives,
            entities: &mut $host.entities,
            limits: &$host.config.limits,
            logger: &$host.config.logger,
        }
    };
}

/// 嵌入 Zephyr 的宿主对象
///
/// 实例按 `EntityId` 升序更新，每个实体最多挂载一个脚本。
pub struct ScriptHost {
    config: RunConfig,
    registry: ScriptRegistry,
    natives: EventBridge,
    entities: EntityRegistry,
    instances: BTreeMap<EntityId, ScriptInstance>,
}

impl ScriptHost {
    pub fn new(config: RunConfig) -> Self {
        let registry = ScriptRegistry::new(config.compiler.clone(), config.logger.clone());
        Self {
            config,
            registry,
            natives: EventBridge::new(),
            entities: EntityRegistry::new(),
            instances: BTreeMap::new(),
        }
    }

    /// 使用进程级默认配置（未初始化时使用默认值）
    pub fn with_global_config() -> Self {
        Self::new(crate::config::config().cloned().unwrap_or_default())
    }

    // ===== 脚本 =====

    /// 编译并注册脚本
    ///
    /// 编译失败的定义同样被注册（挂载的实例不会运行），并返回全部诊断。
    pub fn load_script(
        &mut self,
        name: &str,
        source: &str,
    ) -> Result<Arc<CompiledScriptDefinition>, ZephyrError> {
        let definition = self.registry.load(name, source);
        checked(definition)
    }

    /// 从文件加载，脚本名为文件名（不含扩展名）
    pub fn load_script_file(
        &mut self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<Arc<CompiledScriptDefinition>, ZephyrError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.load_script(&name, &source)
    }

    /// 用保留的源码重新编译，并重建所有使用该脚本的实例
    pub fn reload_script(&mut self, name: &str) -> Result<Arc<CompiledScriptDefinition>, ZephyrError> {
        let definition = self
            .registry
            .reload(name)
            .ok_or_else(|| ZephyrError::UnknownScript(name.to_string()))?;
        self.rebuild_instances(&definition);
        checked(definition)
    }

    /// 用新源码替换脚本，并重建所有使用该脚本的实例
    pub fn reload_script_source(
        &mut self,
        name: &str,
        source: &str,
    ) -> Result<Arc<CompiledScriptDefinition>, ZephyrError> {
        let definition = self.registry.load(name, source);
        self.rebuild_instances(&definition);
        checked(definition)
    }

    /// 清空注册表后重新编译所有脚本，重建所有实例
    ///
    /// 返回所有脚本的编译诊断（合并）。
    pub fn reload_all(&mut self) -> Result<(), ZephyrError> {
        let definitions = self.registry.reload_all();
        let mut diagnostics = Vec::new();
        for definition in definitions {
            self.rebuild_instances(&definition);
            diagnostics.extend(definition.diagnostics.iter().cloned());
        }
        info!(
            self.config.logger,
            "reloaded {} scripts, {} diagnostics",
            self.registry.len(),
            diagnostics.len()
        );
        if diagnostics.is_empty() {
            Ok(())
        } else {
            Err(ZephyrError::Compile(diagnostics))
        }
    }

    /// 一个代码块的反汇编文本
    ///
    /// 代码块名为 `State.onUpdate`、`<init>`、`function 函数名` 或只写函数名。
    pub fn dump_chunk(&self, script: &str, chunk: &str) -> Result<String, ZephyrError> {
        let definition = self
            .registry
            .get(script)
            .ok_or_else(|| ZephyrError::UnknownScript(script.to_string()))?;
        let name = chunk.trim();
        definition
            .chunk(name)
            .map(|c| c.disassemble())
            .ok_or_else(|| ZephyrError::UnknownChunk {
                script: script.to_string(),
                chunk: chunk.to_string(),
            })
    }

    // ===== 实体 =====

    pub fn spawn_entity(&mut self, entity: impl ScriptEntity + 'static) -> EntityId {
        let id = self.entities.insert(entity);
        debug!(self.config.logger, "spawned entity {}", id);
        id
    }

    /// 把脚本挂载到实体上：运行初始化块、应用初始值、进入初始状态
    ///
    /// 实体已有脚本时替换它。
    pub fn attach_script(
        &mut self,
        entity: EntityId,
        script: &str,
        initial_values: EventArgs,
    ) -> Result<(), ZephyrError> {
        if !self.entities.contains(entity) {
            return Err(ZephyrError::UnknownEntity(entity));
        }
        let definition = self
            .registry
            .get(script)
            .ok_or_else(|| ZephyrError::UnknownScript(script.to_string()))?;

        let mut instance = ScriptInstance::new(entity, definition);
        instance.start(&mut host_env!(self), initial_values);
        if self.instances.insert(entity, instance).is_some() {
            debug!(self.config.logger, "replaced script on {}", entity);
        }
        Ok(())
    }

    /// 卸载实体上的脚本，实体本身保留
    pub fn detach_script(&mut self, entity: EntityId) -> Option<ScriptInstance> {
        self.instances.remove(&entity)
    }

    /// 销毁实体和它的脚本实例
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        self.instances.remove(&entity);
        let removed = self.entities.remove(entity).is_some();
        if removed {
            debug!(self.config.logger, "despawned entity {}", entity);
        }
        removed
    }

    // ===== 运行 =====

    /// 一帧：每个实例运行 onUpdate，然后应用其间请求的状态切换
    pub fn update(&mut self) {
        let mut env = host_env!(self);
        for instance in self.instances.values_mut() {
            instance.update(&mut env);
        }
    }

    /// 立即切换实体的状态，目标不存在时返回 `Ok(false)`
    pub fn change_state(&mut self, entity: EntityId, target: &str) -> Result<bool, ZephyrError> {
        let instance = self
            .instances
            .get_mut(&entity)
            .ok_or(ZephyrError::UnknownEntity(entity))?;
        Ok(instance.change_state(&mut host_env!(self), target))
    }

    /// 对一个实体触发脚本事件
    pub fn fire_script_event(
        &mut self,
        entity: EntityId,
        name: &str,
        args: &EventArgs,
    ) -> Result<EventArgs, ZephyrError> {
        let instance = self
            .instances
            .get_mut(&entity)
            .ok_or(ZephyrError::UnknownEntity(entity))?;
        Ok(instance.fire_event(&mut host_env!(self), name, args))
    }

    /// 对所有实例触发事件，按实体顺序返回结果
    pub fn broadcast_event(&mut self, name: &str, args: &EventArgs) -> Vec<(EntityId, EventArgs)> {
        let mut env = host_env!(self);
        self.instances
            .iter_mut()
            .map(|(id, instance)| (*id, instance.fire_event(&mut env, name, args)))
            .collect()
    }

    /// 覆盖实例变量（类型声明过的变量按类型转换）
    pub fn initialize_script_values(
        &mut self,
        entity: EntityId,
        values: &EventArgs,
    ) -> Result<(), ZephyrError> {
        let instance = self
            .instances
            .get_mut(&entity)
            .ok_or(ZephyrError::UnknownEntity(entity))?;
        instance.initialize_values(&mut host_env!(self), values);
        Ok(())
    }

    // ===== 查询 =====

    pub fn current_state(&self, entity: EntityId) -> Option<&str> {
        self.instances.get(&entity).map(|i| i.current_state())
    }

    pub fn variable(&self, entity: EntityId, name: &str) -> Option<&ZephyrValue> {
        self.instances.get(&entity).and_then(|i| i.variable(name))
    }

    pub fn instance(&self, entity: EntityId) -> Option<&ScriptInstance> {
        self.instances.get(&entity)
    }

    pub fn entity(&self, entity: EntityId) -> Option<&dyn ScriptEntity> {
        self.entities.get(entity)
    }

    pub fn entity_mut(&mut self, entity: EntityId) -> Option<&mut (dyn ScriptEntity + 'static)> {
        self.entities.get_mut(entity)
    }

    /// 注册原生处理器
    pub fn natives_mut(&mut self) -> &mut EventBridge {
        &mut self.natives
    }

    pub fn registry(&self) -> &ScriptRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.config.logger
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    // ===== 重载 =====

    /// 重建绑定到同名脚本的实例：重新应用初始值，丢弃未应用的切换
    fn rebuild_instances(&mut self, definition: &Arc<CompiledScriptDefinition>) {
        let mut env = host_env!(self);
        let mut rebuilt = 0;
        for instance in self.instances.values_mut() {
            if instance.definition().name != definition.name {
                continue;
            }
            let values = instance.initial_values().clone();
            let mut fresh = ScriptInstance::new(instance.entity(), Arc::clone(definition));
            fresh.start(&mut env, values);
            *instance = fresh;
            rebuilt += 1;
        }
        info!(
            self.config.logger,
            "reloaded script '{}' (valid={}), rebuilt {} instances",
            definition.name,
            definition.is_valid,
            rebuilt
        );
    }
}

impl std::fmt::Debug for ScriptHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptHost")
            .field("config", &self.config)
            .field("scripts", &self.registry.names())
            .field("natives", &self.natives.names())
            .field("entities", &self.entities.len())
            .field("instances", &self.instances.len())
            .finish()
    }
}

fn checked(
    definition: Arc<CompiledScriptDefinition>,
) -> Result<Arc<CompiledScriptDefinition>, ZephyrError> {
    if definition.is_valid {
        Ok(definition)
    } else {
        Err(ZephyrError::Compile(definition.diagnostics.clone()))
    }
}
