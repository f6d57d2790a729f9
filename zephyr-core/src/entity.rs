//! 实体句柄与字段能力接口
//!
//! 脚本实例只保存 [`EntityId`]，每次访问时通过 [`EntityRegistry`] 解析；
//! 实体销毁后句柄解析失败，而不是悬空。

use crate::value::ZephyrValue;
use std::collections::BTreeMap;
use std::fmt;

/// 不透明实体句柄，0 表示无效
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntityId(pub u32);

impl EntityId {
    pub const INVALID: EntityId = EntityId(0);

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 需要暴露给脚本的宿主实体实现此 trait
pub trait ScriptEntity {
    /// 读取字段，不存在返回 `None`
    fn get_field(&self, name: &str) -> Option<ZephyrValue>;

    /// 写入字段，实体没有该字段时返回 `false`
    fn set_field(&mut self, name: &str, value: ZephyrValue) -> bool;

    fn field_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// 以字段表实现的通用实体
///
/// 只能写入构建时声明过的字段。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldEntity {
    fields: BTreeMap<String, ZephyrValue>,
}

impl FieldEntity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<ZephyrValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

impl ScriptEntity for FieldEntity {
    fn get_field(&self, name: &str) -> Option<ZephyrValue> {
        self.fields.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: ZephyrValue) -> bool {
        match self.fields.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}

/// 实体注册表
pub struct EntityRegistry {
    entities: BTreeMap<EntityId, Box<dyn ScriptEntity>>,
    next_id: u32,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// 插入实体并分配新 id
    pub fn insert(&mut self, entity: impl ScriptEntity + 'static) -> EntityId {
        self.insert_boxed(Box::new(entity))
    }

    pub fn insert_boxed(&mut self, entity: Box<dyn ScriptEntity>) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.insert(id, entity);
        id
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Box<dyn ScriptEntity>> {
        self.entities.remove(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&dyn ScriptEntity> {
        self.entities.get(&id).map(|e| e.as_ref())
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut (dyn ScriptEntity + 'static)> {
        self.entities.get_mut(&id).map(|e| e.as_mut())
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_never_reused() {
        let mut registry = EntityRegistry::new();
        let a = registry.insert(FieldEntity::new());
        let b = registry.insert(FieldEntity::new());
        assert_ne!(a, b);
        assert!(a.is_valid());

        registry.remove(a);
        let c = registry.insert(FieldEntity::new());
        assert_ne!(c, a);
        assert!(!registry.contains(a));
    }

    #[test]
    fn test_field_entity_only_writes_declared_fields() {
        let mut registry = EntityRegistry::new();
        let id = registry.insert(FieldEntity::new().with_field("health", 10.0));

        let entity = registry.get_mut(id).unwrap();
        assert!(entity.set_field("health", ZephyrValue::Number(4.0)));
        assert!(!entity.set_field("mana", ZephyrValue::Number(1.0)));

        let entity = registry.get(id).unwrap();
        assert_eq!(entity.get_field("health"), Some(ZephyrValue::Number(4.0)));
        assert_eq!(entity.get_field("mana"), None);
        assert_eq!(entity.field_names(), vec!["health".to_string()]);
    }

    #[test]
    fn test_destroyed_entity_does_not_resolve() {
        let mut registry = EntityRegistry::new();
        let id = registry.insert(FieldEntity::new());
        registry.remove(id);
        assert!(registry.get(id).is_none());
        assert_eq!(EntityId::INVALID.to_string(), "#0");
    }
}
