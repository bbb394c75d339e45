//! Cognitive functions the oracle may call on the robot's own memory.

use robo_llm::provider::FunctionSchema;
use serde_json::{Value, json};

use crate::capability::CapabilityKind;
use crate::memory::objects::{Material, OBJECT_ATTRIBUTES, Shape};
use crate::types::{Taxonomy, UserInputLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CognitiveFunction {
    MemorizeObject,
    UpdateObject,
    Recall,
    LoadEnvironmentKnowledge,
    LoadBodyStatus,
    LoadActivityLogs,
    ProcessComplexInput,
    Think,
}

/// Offered while recalling: memory loaders and object updates.
pub const RECALL_FUNCTIONS: &[CognitiveFunction] = &[
    CognitiveFunction::UpdateObject,
    CognitiveFunction::LoadEnvironmentKnowledge,
    CognitiveFunction::LoadBodyStatus,
    CognitiveFunction::LoadActivityLogs,
];

/// Offered while memorizing a statement about an object.
pub const MEMORIZE_FUNCTIONS: &[CognitiveFunction] =
    &[CognitiveFunction::MemorizeObject, CognitiveFunction::UpdateObject];

/// Offered when acting on a COGNITION task.
pub const ACT_FUNCTIONS: &[CognitiveFunction] = &[
    CognitiveFunction::Recall,
    CognitiveFunction::MemorizeObject,
    CognitiveFunction::ProcessComplexInput,
    CognitiveFunction::Think,
];

impl CognitiveFunction {
    pub const ALL: &'static [Self] = &[
        Self::MemorizeObject,
        Self::UpdateObject,
        Self::Recall,
        Self::LoadEnvironmentKnowledge,
        Self::LoadBodyStatus,
        Self::LoadActivityLogs,
        Self::ProcessComplexInput,
        Self::Think,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::MemorizeObject => "memorize_object",
            Self::UpdateObject => "update_object",
            Self::Recall => "recall",
            Self::LoadEnvironmentKnowledge => "load_environment_knowledge",
            Self::LoadBodyStatus => "load_body_status",
            Self::LoadActivityLogs => "load_activity_logs",
            Self::ProcessComplexInput => "process_complex_input",
            Self::Think => "think",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    pub fn schema(self) -> FunctionSchema {
        match self {
            Self::MemorizeObject => FunctionSchema::new(
                self.name(),
                "Memorize an object with all the attributes that you can extract from the user's input",
                object_parameters("The name of the object", false),
            ),
            Self::UpdateObject => FunctionSchema::new(
                self.name(),
                "Update the knowledge of an object with the attributes that you can extract from the user's input as well as the already known attributes existent in memory",
                object_parameters("The name of the object based on the name of the object that you recalled previously", true),
            ),
            Self::Recall => FunctionSchema::new(
                self.name(),
                "Recall your knowledge of an object or location",
                json!({
                    "type": "object",
                    "properties": {
                        "name": {
                            "type": "string",
                            "description": "The description of the object or location to recall in an inquisitive format."
                        }
                    },
                    "required": ["name"]
                }),
            ),
            Self::LoadEnvironmentKnowledge => FunctionSchema::new(
                self.name(),
                "Load environment knowledge depending on the required attributes specified by the user",
                json!({
                    "type": "object",
                    "properties": {
                        "attributes": {
                            "type": "array",
                            "description": "The attributes of the objects that should be loaded. (e.g. 'name', 'color', 'shape')",
                            "items": {"type": "string", "enum": OBJECT_ATTRIBUTES}
                        }
                    }
                }),
            ),
            Self::LoadBodyStatus => {
                let components: Vec<&str> = CapabilityKind::ALL.iter().map(|k| k.component()).collect();
                FunctionSchema::new(
                    self.name(),
                    "Load status of the robot",
                    json!({
                        "type": "object",
                        "properties": {
                            "attributes": {
                                "type": "array",
                                "description": "The attributes of the robot that should be loaded.",
                                "items": {
                                    "type": "string",
                                    "enum": components
                                }
                            }
                        }
                    }),
                )
            }
            Self::LoadActivityLogs => FunctionSchema::new(
                self.name(),
                "Load the activity logs of the system such as user inputs, robot actions, dialogue, reasoning process",
                json!({
                    "type": "object",
                    "properties": {
                        "time_span": {
                            "type": "integer",
                            "description": "From how far back in time these logs should be loaded (in seconds). Can be ignored to load all logs."
                        },
                        "frame_size": {
                            "type": "integer",
                            "description": "The number of logs to be loaded in one frame. Can be ignored to load all logs."
                        }
                    }
                }),
            ),
            Self::ProcessComplexInput => {
                let labels: Vec<&str> = UserInputLabel::MEMBERS.iter().map(|l| l.name()).collect();
                FunctionSchema::new(
                    self.name(),
                    "Process the set of sub-inputs resulted from the user's input based on their label.",
                    json!({
                        "type": "object",
                        "properties": {
                            "subphrases": {
                                "type": "array",
                                "description": "The derived sub-inputs from the user's input, with their labels.",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "label": {
                                            "type": "string",
                                            "enum": labels
                                        },
                                        "phrase": {"type": "string"}
                                    },
                                    "required": ["label", "phrase"]
                                }
                            }
                        },
                        "required": ["subphrases"]
                    }),
                )
            }
            Self::Think => FunctionSchema::new(
                self.name(),
                "Think about the input and try to reason about it to find an answer.",
                json!({
                    "type": "object",
                    "properties": {
                        "input": {"type": "string", "description": "The input to reason about."}
                    },
                    "required": ["input"]
                }),
            ),
        }
    }
}

/// Schemas for a subset, in subset order.
pub fn schemas(subset: &[CognitiveFunction]) -> Vec<FunctionSchema> {
    subset.iter().map(|f| f.schema()).collect()
}

fn object_parameters(name_description: &str, name_required: bool) -> Value {
    let shapes: Vec<&str> = Shape::ALL.iter().map(|s| s.as_str()).collect();
    let materials: Vec<&str> = Material::ALL.iter().map(|m| m.as_str()).collect();
    let mut parameters = json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "description": name_description},
            "color": {"type": "string", "description": "The color of the object"},
            "shape": {"type": "string", "description": "The shape of the object", "enum": shapes},
            "material": {"type": "string", "description": "The material of the object", "enum": materials},
            "width": {"type": "number", "description": "The width of the object"},
            "height": {"type": "number", "description": "The height of the object"},
            "length": {"type": "number", "description": "The depth of the object"},
            "x": {"type": "number", "description": "The x coordinate of the object"},
            "y": {"type": "number", "description": "The y coordinate of the object"},
            "z": {"type": "number", "description": "The z coordinate of the object"},
            "support_surface": {
                "type": "string",
                "description": "The support surface of the object. Can be the name of another object or the name of a location"
            },
            "contains": {
                "type": "array",
                "description": "The object names that this object contains",
                "items": {"type": "string"}
            }
        }
    });
    if name_required {
        parameters["required"] = json!(["name"]);
    }
    parameters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for function in CognitiveFunction::ALL {
            assert_eq!(CognitiveFunction::from_name(function.name()), Some(*function));
            assert_eq!(function.schema().name, function.name());
        }
        assert_eq!(CognitiveFunction::from_name("fly"), None);
    }

    #[test]
    fn subsets_are_disjoint_where_expected() {
        assert!(!RECALL_FUNCTIONS.contains(&CognitiveFunction::Recall));
        assert!(ACT_FUNCTIONS.contains(&CognitiveFunction::Think));
        assert_eq!(schemas(MEMORIZE_FUNCTIONS).len(), 2);
    }

    #[test]
    fn update_requires_name_but_memorize_does_not() {
        assert_eq!(CognitiveFunction::UpdateObject.schema().parameters["required"], json!(["name"]));
        assert!(CognitiveFunction::MemorizeObject.schema().parameters.get("required").is_none());
    }

    #[test]
    fn label_enum_lists_every_input_label() {
        let schema = CognitiveFunction::ProcessComplexInput.schema();
        let labels = &schema.parameters["properties"]["subphrases"]["items"]["properties"]["label"]["enum"];
        assert_eq!(labels.as_array().map(Vec::len), Some(UserInputLabel::MEMBERS.len()));
    }
}
