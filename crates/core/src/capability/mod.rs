use std::collections::HashMap;

use robo_llm::provider::FunctionSchema;
use serde_json::{Map, Value};

use crate::cognition::functions::CognitiveFunction;
use crate::error::{CapabilityError, RegistryError};

/// Physical subsystem a provider drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Navigation,
    Manipulation,
    Vision,
}

impl CapabilityKind {
    pub const ALL: &'static [Self] = &[Self::Manipulation, Self::Vision, Self::Navigation];

    /// Component name used by the `load_body_status` function.
    pub fn component(self) -> &'static str {
        match self {
            Self::Navigation => "navigator",
            Self::Manipulation => "manipulator",
            Self::Vision => "vision",
        }
    }

    pub fn from_component(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.component() == name.trim())
    }
}

/// External component exposing a fixed set of callable actions.
///
/// Actions report outcomes as human-readable strings; a string containing
/// `Error` marks the enclosing task as failed. `Err` is reserved for faults
/// that prevented the action from running at all.
#[async_trait::async_trait]
pub trait CapabilityProvider: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> CapabilityKind;
    fn function_schemas(&self) -> Vec<FunctionSchema>;
    /// Human-readable snapshot of the provider's internal state.
    fn status(&self) -> String;
    async fn invoke(&self, function: &str, args: &Map<String, Value>) -> Result<String, CapabilityError>;
}

/// Providers keyed by the function names they declare.
/// Built once at startup; conflicting declarations are rejected.
#[derive(Default)]
pub struct CapabilityRegistry {
    providers: Vec<Box<dyn CapabilityProvider>>,
    routes: HashMap<String, usize>,
}

impl CapabilityRegistry {
    pub fn new(providers: Vec<Box<dyn CapabilityProvider>>) -> Result<Self, RegistryError> {
        let mut routes = HashMap::new();
        for (index, provider) in providers.iter().enumerate() {
            for schema in provider.function_schemas() {
                if schema.name.trim().is_empty() {
                    return Err(RegistryError::EmptyName(provider.name().to_owned()));
                }
                if CognitiveFunction::from_name(&schema.name).is_some() {
                    return Err(RegistryError::Reserved(schema.name));
                }
                if routes.insert(schema.name.clone(), index).is_some() {
                    return Err(RegistryError::Duplicate(schema.name));
                }
            }
        }
        tracing::info!(providers = providers.len(), functions = routes.len(), "capability registry ready");
        Ok(Self { providers, routes })
    }

    /// Schemas declared by every provider of the given kinds.
    pub fn schemas_for(&self, kinds: &[CapabilityKind]) -> Vec<FunctionSchema> {
        self.providers
            .iter()
            .filter(|p| kinds.contains(&p.kind()))
            .flat_map(|p| p.function_schemas())
            .collect()
    }

    pub fn contains(&self, function: &str) -> bool {
        self.routes.contains_key(function)
    }

    pub async fn invoke(&self, function: &str, args: &Map<String, Value>) -> Result<String, CapabilityError> {
        let index = self
            .routes
            .get(function)
            .copied()
            .ok_or_else(|| CapabilityError::UnknownFunction(function.to_owned()))?;
        let provider = &self.providers[index];
        tracing::debug!(provider = provider.name(), function, "invoking capability");
        provider.invoke(function, args).await
    }

    /// Status lines of the providers of the given kinds, in registration order.
    pub fn status_of(&self, kinds: &[CapabilityKind]) -> Vec<String> {
        self.providers
            .iter()
            .filter(|p| kinds.contains(&p.kind()))
            .map(|p| p.status())
            .collect()
    }

    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Provider answering every call with a fixed string.
    pub(crate) struct EchoProvider {
        pub name: &'static str,
        pub kind: CapabilityKind,
        pub functions: Vec<&'static str>,
        pub reply: &'static str,
    }

    #[async_trait::async_trait]
    impl CapabilityProvider for EchoProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn kind(&self) -> CapabilityKind {
            self.kind
        }

        fn function_schemas(&self) -> Vec<FunctionSchema> {
            self.functions
                .iter()
                .map(|f| FunctionSchema::new(*f, "test action", json!({"type": "object", "properties": {}})))
                .collect()
        }

        fn status(&self) -> String {
            format!("{} ready", self.name)
        }

        async fn invoke(&self, function: &str, _args: &Map<String, Value>) -> Result<String, CapabilityError> {
            if function == "explode" {
                return Err(CapabilityError::Failed("actuator jammed".into()));
            }
            Ok(self.reply.to_owned())
        }
    }

    fn echo(name: &'static str, kind: CapabilityKind, functions: Vec<&'static str>) -> Box<dyn CapabilityProvider> {
        Box::new(EchoProvider { name, kind, functions, reply: "ok" })
    }

    #[test]
    fn rejects_duplicate_function_names() {
        let result = CapabilityRegistry::new(vec![
            echo("wheels", CapabilityKind::Navigation, vec!["move_to_object"]),
            echo("legs", CapabilityKind::Navigation, vec!["move_to_object"]),
        ]);
        assert!(matches!(result, Err(RegistryError::Duplicate(name)) if name == "move_to_object"));
    }

    #[test]
    fn rejects_cognitive_names_and_empty_names() {
        let reserved = CapabilityRegistry::new(vec![echo("arm", CapabilityKind::Manipulation, vec!["recall"])]);
        assert!(matches!(reserved, Err(RegistryError::Reserved(_))));
        let empty = CapabilityRegistry::new(vec![echo("arm", CapabilityKind::Manipulation, vec![" "])]);
        assert!(matches!(empty, Err(RegistryError::EmptyName(_))));
    }

    #[tokio::test]
    async fn routes_by_name_and_filters_by_kind() {
        let registry = CapabilityRegistry::new(vec![
            echo("wheels", CapabilityKind::Navigation, vec!["move_to_object"]),
            echo("arm", CapabilityKind::Manipulation, vec!["pick_up_object", "explode"]),
        ])
        .unwrap();

        assert_eq!(registry.schemas_for(&[CapabilityKind::Manipulation]).len(), 2);
        assert_eq!(registry.schemas_for(&[CapabilityKind::Vision]).len(), 0);
        assert_eq!(registry.status_of(&[CapabilityKind::Navigation]), vec!["wheels ready".to_string()]);
        assert_eq!(registry.function_names(), vec!["explode", "move_to_object", "pick_up_object"]);

        let ok = registry.invoke("pick_up_object", &Map::new()).await.unwrap();
        assert_eq!(ok, "ok");
        let unknown = registry.invoke("fly", &Map::new()).await;
        assert!(matches!(unknown, Err(CapabilityError::UnknownFunction(_))));
        let fault = registry.invoke("explode", &Map::new()).await;
        assert!(matches!(fault, Err(CapabilityError::Failed(_))));
    }

    #[test]
    fn component_names_round_trip() {
        for kind in CapabilityKind::ALL {
            assert_eq!(CapabilityKind::from_component(kind.component()), Some(*kind));
        }
        assert_eq!(CapabilityKind::from_component("wings"), None);
    }
}
