//! Adapter layer that isolates each vendor logic engine and marshals values across the
//! call boundary (C4). There is no teacher precedent for FFI isolation (the pack has none), so
//! this is modeled directly on the contract described for the original JVM URL-scoped class
//! loader: each engine is loaded once per (name, version) into its own isolate and held for the
//! life of the process. A `libloading::Library` handle would have exactly this shape if a real
//! native engine were linked in; here the isolate is a boxed `Engine` trait object so the rest of
//! the crate can be exercised without one.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::Error;
use crate::model::codec::format_compact;

/// A value marshaled across the engine boundary. Mirrors the primitive conversions every module
/// client needs (§4.4): 32-bit integers, arbitrary-precision decimals built from a string,
/// fixed-format dates, and plain strings.
#[derive(Debug, Clone)]
pub enum EngineValue {
    Int(i32),
    Decimal(f64),
    Date(NaiveDate),
    Str(String),
    List(Vec<EngineValue>),
    Null,
}

impl EngineValue {
    pub fn as_request_field(&self) -> String {
        match self {
            EngineValue::Int(v) => v.to_string(),
            EngineValue::Decimal(v) => format!("{v:.2}"),
            EngineValue::Date(d) => format_compact(d),
            EngineValue::Str(s) => s.clone(),
            EngineValue::List(_) => String::new(),
            EngineValue::Null => String::new(),
        }
    }
}

/// A flat bag of marshaled fields handed to an engine's `process` entry point.
#[derive(Debug, Clone, Default)]
pub struct EngineRequest {
    pub fields: HashMap<String, EngineValue>,
}

impl EngineRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: EngineValue) -> &mut Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// Raw getter-style output from an engine call, before a module client's extractor turns it
/// into a typed `ModuleOutput`.
#[derive(Debug, Clone, Default)]
pub struct EngineResponse {
    pub fields: HashMap<String, Value>,
}

impl EngineResponse {
    /// Numeric extraction helper equivalent to the original `float_or_none`: returns `None` on a
    /// missing getter or a null value rather than defaulting to 0.0, so callers can distinguish
    /// "absent" from "zero" (§4.4).
    pub fn float_or_none(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(|v| v.as_f64())
    }

    pub fn string_or_default(&self, key: &str) -> String {
        self.fields
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }
}

/// One vendor logic engine, isolated from every other engine loaded in the process.
pub trait Engine: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn process(&self, request: &EngineRequest) -> Result<EngineResponse, Error>;
}

/// Loads and holds one isolate per (engine name, version), keyed by the artifact path it was
/// constructed from (§4.4, §9).
#[derive(Default)]
pub struct EngineRegistry {
    isolates: RwLock<HashMap<(String, String), Arc<dyn Engine>>>,
    artifact_paths: RwLock<HashMap<(String, String), PathBuf>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, engine: Arc<dyn Engine>, artifact_path: PathBuf) {
        let key = (engine.name().to_string(), engine.version().to_string());
        self.artifact_paths
            .write()
            .expect("engine registry lock poisoned")
            .insert(key.clone(), artifact_path);
        self.isolates
            .write()
            .expect("engine registry lock poisoned")
            .insert(key, engine);
    }

    pub fn get(&self, name: &str, version: &str) -> Option<Arc<dyn Engine>> {
        self.isolates
            .read()
            .expect("engine registry lock poisoned")
            .get(&(name.to_string(), version.to_string()))
            .cloned()
    }

    /// Invokes an engine and normalizes any fault it raises into the typed `EngineFault`
    /// variant, carrying the engine name, the attempted operation, and the original message —
    /// never the raw vendor error type (§4.4, §7).
    pub fn call(
        &self,
        name: &str,
        version: &str,
        operation: &str,
        request: &EngineRequest,
    ) -> Result<EngineResponse, Error> {
        let engine = self.get(name, version).ok_or_else(|| Error::VersionUnavailable {
            module: name.to_string(),
            as_of: version.to_string(),
        })?;
        engine.process(request).map_err(|e| match e {
            Error::EngineFault { .. } => e,
            other => Error::EngineFault {
                engine: name.to_string(),
                operation: operation.to_string(),
                message: other.to_string(),
            },
        })
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    /// A deterministic stand-in engine used by module-client tests so they can exercise the
    /// adapter contract without a real vendor binary.
    pub struct EchoEngine {
        pub name: String,
        pub version: String,
    }

    impl Engine for EchoEngine {
        fn name(&self) -> &str {
            &self.name
        }

        fn version(&self) -> &str {
            &self.version
        }

        fn process(&self, request: &EngineRequest) -> Result<EngineResponse, Error> {
            let mut fields = HashMap::new();
            for (k, v) in &request.fields {
                fields.insert(k.clone(), Value::String(v.as_request_field()));
            }
            Ok(EngineResponse { fields })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::EchoEngine;
    use super::*;

    #[test]
    fn call_routes_to_registered_engine() {
        let registry = EngineRegistry::new();
        registry.register(
            Arc::new(EchoEngine {
                name: "msdrg".into(),
                version: "421".into(),
            }),
            PathBuf::from("jars/pricers/msdrg-421.jar"),
        );

        let mut req = EngineRequest::new();
        req.set("age", EngineValue::Int(65));

        let resp = registry.call("msdrg", "421", "process", &req).unwrap();
        assert_eq!(resp.string_or_default("age"), "65");
    }

    #[test]
    fn call_against_unknown_version_is_version_unavailable() {
        let registry = EngineRegistry::new();
        let req = EngineRequest::new();
        let err = registry.call("msdrg", "999", "process", &req).unwrap_err();
        assert!(matches!(err, Error::VersionUnavailable { .. }));
    }
}
