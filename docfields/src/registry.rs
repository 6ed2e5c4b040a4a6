use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::{EngineError, EngineResult};
use crate::field_types::{
    BooleanHandler, DateHandler, DateTimeHandler, DynTypeHandler, EmailHandler, FieldConfig, IntegerHandler,
    MonetaryHandler, MultiSelectHandler, NumberHandler, SelectHandler, TextHandler, TypeHandler, TypeInfo,
    UrlHandler, YearMonthHandler,
};

/// `type_id → handler` map. Built once at startup, then shared read-only.
#[derive(Default, Clone)]
pub struct TypeRegistry {
    handlers: HashMap<&'static str, Arc<dyn DynTypeHandler>>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.handlers.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("TypeRegistry").field("types", &ids).finish()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in field type.
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        registry.register_builtins();
        registry
    }

    fn register_builtins(&mut self) {
        let builtins: [Arc<dyn DynTypeHandler>; 13] = [
            Arc::new(TextHandler::text()),
            Arc::new(TextHandler::short_text()),
            Arc::new(IntegerHandler),
            Arc::new(NumberHandler),
            Arc::new(MonetaryHandler),
            Arc::new(BooleanHandler),
            Arc::new(DateHandler),
            Arc::new(DateTimeHandler),
            Arc::new(YearMonthHandler),
            Arc::new(SelectHandler),
            Arc::new(MultiSelectHandler),
            Arc::new(UrlHandler),
            Arc::new(EmailHandler),
        ];
        for handler in builtins {
            // Built-in ids are distinct constants.
            self.handlers.insert(handler.type_id(), handler);
        }
    }

    pub fn register<H: TypeHandler>(&mut self, handler: H) -> EngineResult<()> {
        self.register_arc(Arc::new(handler))
    }

    pub fn register_arc(&mut self, handler: Arc<dyn DynTypeHandler>) -> EngineResult<()> {
        let type_id = handler.type_id();
        if self.handlers.contains_key(type_id) {
            return Err(EngineError::DuplicateType {
                type_id: type_id.to_string(),
            });
        }
        log::debug!("registered field type '{type_id}'");
        self.handlers.insert(type_id, handler);
        Ok(())
    }

    pub fn get(&self, type_id: &str) -> EngineResult<&Arc<dyn DynTypeHandler>> {
        self.handlers.get(type_id).ok_or_else(|| EngineError::UnknownType {
            type_id: type_id.to_string(),
        })
    }

    pub fn has(&self, type_id: &str) -> bool {
        self.handlers.contains_key(type_id)
    }

    /// Registered types, ordered by `type_id`.
    pub fn list(&self) -> Vec<TypeInfo> {
        let mut infos: Vec<TypeInfo> = self.handlers.values().map(|handler| handler.info()).collect();
        infos.sort_by(|a, b| a.type_id.cmp(&b.type_id));
        infos
    }

    pub fn validate_config(&self, type_id: &str, raw: &Value) -> EngineResult<FieldConfig> {
        let handler = self.get(type_id)?;
        handler.parse_config(raw).map_err(|message| EngineError::InvalidConfig {
            type_id: type_id.to_string(),
            message,
        })
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
