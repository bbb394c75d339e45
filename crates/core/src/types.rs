use serde::{Deserialize, Serialize};
use std::fmt;

/// A closed set of labels the oracle can be asked to choose from.
pub trait Taxonomy: Sized + Copy + fmt::Debug + 'static {
    const MEMBERS: &'static [Self];

    /// Canonical name, the exact token the oracle must answer with.
    fn name(self) -> &'static str;

    fn description(self) -> &'static str;

    /// Maps an oracle answer onto a member. Only surrounding whitespace is tolerated.
    fn from_name(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::MEMBERS.iter().copied().find(|m| m.name() == token)
    }

    /// Listing of every member with its description, as shown to the oracle.
    fn prompt_content() -> String {
        let mut content = String::from("Labels:\n");
        for member in Self::MEMBERS {
            content.push_str(member.name());
            content.push_str(" = ");
            content.push_str(member.description());
            content.push('\n');
        }
        content
    }
}

const METHODOLOGY_DESC: &str = "Advice related to the method in which the robot can fulfill a certain action. It usually includes 'should' or 'could' but it is not limited to those words (example: 'You should pick up object x from the top.', 'You could use object x to do action y.', etc.)";
const LIMITATION_DESC: &str = "Input related to what limitations the robot has when fulfilling a task from the user. It usually includes negative words such as 'cannot', 'should not', 'could not', etc. (example: 'You cannot use object x', 'You must not touch object x after you do action y', etc.)";
const OBJECT_INFORMATION_DESC: &str = "Attribute information regarding an object in the environment of the robot. It usually addresses a specific object, defining its attributes such as color, size, shape, etc. (example: 'Object x is red.', 'Object x is small.', 'There is an object x in location y.', etc.)";

/// Intent of one sentence of operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserInputLabel {
    Task,
    QuestionEnvKnowledge,
    QuestionGenKnowledge,
    Methodology,
    Limitation,
    ObjectInformation,
    Abort,
    Uncertain,
}

impl Taxonomy for UserInputLabel {
    const MEMBERS: &'static [Self] = &[
        Self::Task,
        Self::QuestionEnvKnowledge,
        Self::QuestionGenKnowledge,
        Self::Methodology,
        Self::Limitation,
        Self::ObjectInformation,
        Self::Abort,
        Self::Uncertain,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Task => "TASK",
            Self::QuestionEnvKnowledge => "QUESTION_ENV_KNOWLEDGE",
            Self::QuestionGenKnowledge => "QUESTION_GEN_KNOWLEDGE",
            Self::Methodology => "METHODOLOGY",
            Self::Limitation => "LIMITATION",
            Self::ObjectInformation => "OBJECT_INFORMATION",
            Self::Abort => "ABORT",
            Self::Uncertain => "UNCERTAIN",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Task => "New task to be completed by the robot (example: 'Pick up object x', 'Go to location y', 'Take object x to location y', etc.)",
            Self::QuestionEnvKnowledge => "Question to be answered about the surrounding environment of the robot such as objects and locations. It is formulated as a question that can be answered with a single word or a short phrase (example: 'Where is x?', 'What is the color of x?', 'What is the size of x?', etc.)",
            Self::QuestionGenKnowledge => "Question to be answered about non-situation specific knowledge. It is formulated as a question that can be answered with a single word or a short phrase (example: 'What is x?', 'What is the usual color of x?', 'What is the average size of x?', etc.)",
            Self::Methodology => METHODOLOGY_DESC,
            Self::Limitation => LIMITATION_DESC,
            Self::ObjectInformation => OBJECT_INFORMATION_DESC,
            Self::Abort => "A request provided to the robot to abort the current task (example: 'Abort the current task.', 'Stop what you are doing.', 'Stop.', etc.)",
            Self::Uncertain => "None of the above tags apply to this input",
        }
    }
}

/// Kind of standing advice given by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdviceLabel {
    Methodology,
    Limitation,
    ObjectInformation,
}

impl Taxonomy for AdviceLabel {
    const MEMBERS: &'static [Self] = &[Self::Methodology, Self::Limitation, Self::ObjectInformation];

    fn name(self) -> &'static str {
        match self {
            Self::Methodology => "METHODOLOGY",
            Self::Limitation => "LIMITATION",
            Self::ObjectInformation => "OBJECT_INFORMATION",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Methodology => METHODOLOGY_DESC,
            Self::Limitation => LIMITATION_DESC,
            Self::ObjectInformation => OBJECT_INFORMATION_DESC,
        }
    }
}

/// Type of a task on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskLabel {
    UserInput,
    Inquiry,
    Navigation,
    Manipulation,
    Perception,
    Cognition,
}

impl Taxonomy for TaskLabel {
    const MEMBERS: &'static [Self] = &[
        Self::UserInput,
        Self::Inquiry,
        Self::Navigation,
        Self::Manipulation,
        Self::Perception,
        Self::Cognition,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::UserInput => "USER_INPUT",
            Self::Inquiry => "INQUIRY",
            Self::Navigation => "NAVIGATION",
            Self::Manipulation => "MANIPULATION",
            Self::Perception => "PERCEPTION",
            Self::Cognition => "COGNITION",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::UserInput => "User input. Do not use this label because it is used internally and automatically assigned by another function (examples: 'Pick up the tomato.', 'What is the color of the table?', 'How heavy is a tomato on average?')",
            Self::Inquiry => "Inquiry for advice, input or confirmation from the user (examples: 'Ask the user where the tomato is.', 'Ask the user how to pick up the tomato.', 'Ask the user if the tomato on the cutting board is the one they were referring to.')",
            Self::Navigation => "Navigating through the environment (examples: 'Go to the kitchen.', 'Go to the table.', 'Go to the fridge.', 'Move to object.')",
            Self::Manipulation => "Interacting with objects in the environment (examples: 'Pick up the object.', 'Place the object on the table.', 'Open the object.', 'Close the object.', 'Cut the object.')",
            Self::Perception => "Perception actions regarding the surrounding environment (examples: 'Detect the tomatoes.', 'Find the cutting board', 'Look at the table.')",
            Self::Cognition => "Cognitive actions such as recalling from memory, memorization or reasoning to generate a plan or estimation (examples: 'Recall the location of the tomato.', 'Estimate the weight of the tomato.', 'Reason about how to pick up the tomato.')",
        }
    }
}

impl fmt::Display for TaskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    New,
    InProgress,
    Paused,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::InProgress => "In Progress",
            Self::Paused => "Paused",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purpose of one oracle exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationType {
    Chat,
    Labelling,
    Recalling,
    Deciding,
    Memorizing,
    Acting,
}
