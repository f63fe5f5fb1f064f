//! Transcript data model.
//!
//! Loading is tolerant: a transcript that breaks the role or
//! pairing rules must still load so the sequence checks can enumerate every
//! violation. Only a document without a `messages` array is rejected.

use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Cot,
    Assistant,
    Function,
    Other(String),
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "system" => Role::System,
            "user" => Role::User,
            "cot" => Role::Cot,
            "assistant" => Role::Assistant,
            "function" => Role::Function,
            other => Role::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Cot => write!(f, "cot"),
            Role::Assistant => write!(f, "assistant"),
            Role::Function => write!(f, "function"),
            Role::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// Message `content` as it appeared in the document.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    /// Present but not a string (object, array, number, bool).
    NonText(Value),
    Absent,
}

impl Content {
    fn from_field(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Content::Absent,
            Some(Value::String(s)) => Content::Text(s.clone()),
            Some(other) => Content::NonText(other.clone()),
        }
    }

    /// Text view; non-text content reads as empty.
    pub fn text(&self) -> &str {
        match self {
            Content::Text(s) => s,
            _ => "",
        }
    }
}

/// Tool-call arguments in either accepted encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Arguments {
    Encoded(String),
    Parsed(Map<String, Value>),
    /// Neither a string nor an object.
    Invalid(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentsError {
    Json(String),
    NotAnObject(&'static str),
}

impl fmt::Display for ArgumentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentsError::Json(reason) => write!(f, "{}", reason),
            ArgumentsError::NotAnObject(kind) => write!(f, "arguments decode to {}, not an object", kind),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl Arguments {
    fn from_field(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Arguments::Parsed(Map::new()),
            Some(Value::String(s)) => Arguments::Encoded(s.clone()),
            Some(Value::Object(map)) => Arguments::Parsed(map.clone()),
            Some(other) => Arguments::Invalid(other.clone()),
        }
    }

    /// Decode into an argument map. A blank encoded string is an empty map.
    pub fn parse(&self) -> Result<Map<String, Value>, ArgumentsError> {
        match self {
            Arguments::Parsed(map) => Ok(map.clone()),
            Arguments::Encoded(raw) => {
                if raw.trim().is_empty() {
                    return Ok(Map::new());
                }
                match serde_json::from_str::<Value>(raw) {
                    Ok(Value::Object(map)) => Ok(map),
                    Ok(other) => Err(ArgumentsError::NotAnObject(json_kind(&other))),
                    Err(e) => Err(ArgumentsError::Json(e.to_string())),
                }
            }
            Arguments::Invalid(other) => Err(ArgumentsError::NotAnObject(json_kind(other))),
        }
    }

    /// Text form used for pattern scanning.
    pub fn to_scan_text(&self) -> String {
        match self {
            Arguments::Encoded(raw) => raw.clone(),
            Arguments::Parsed(map) => Value::Object(map.clone()).to_string(),
            Arguments::Invalid(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Arguments,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub index: usize,
    pub role: Role,
    pub content: Content,
    /// `name` of a function message.
    pub name: Option<String>,
    pub invocation: Option<ToolInvocation>,
}

impl Message {
    pub fn text(&self) -> &str {
        self.content.text()
    }

    pub fn is_call(&self) -> bool {
        self.role == Role::Assistant && self.invocation.is_some()
    }
}

/// One declared tool: `{type: "function", function: {name, description, parameters}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDecl {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The declared tool set, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCatalog {
    tools: Vec<ToolDecl>,
}

impl ToolCatalog {
    pub fn from_value(value: &Value) -> Self {
        let tools = value
            .as_array()
            .map(|items| items.iter().filter_map(tool_decl).collect())
            .unwrap_or_default();
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDecl> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn distinct_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for tool in &self.tools {
            if !names.contains(&tool.name.as_str()) {
                names.push(&tool.name);
            }
        }
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn tool_decl(item: &Value) -> Option<ToolDecl> {
    let function = item.get("function")?;
    let name = function.get("name")?.as_str()?.trim().to_string();
    Some(ToolDecl {
        name,
        description: function
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        parameters: function
            .get("parameters")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    MissingMessages,
    MessagesNotArray,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::MissingMessages => write!(f, "transcript has no 'messages' field"),
            LoadError::MessagesNotArray => write!(f, "'messages' is not an array"),
        }
    }
}

/// An immutable, loaded transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    messages: Vec<Message>,
    tools: Option<ToolCatalog>,
}

impl Transcript {
    pub fn from_value(doc: &Value) -> Result<Self, LoadError> {
        let raw_messages = match doc.get("messages") {
            None => return Err(LoadError::MissingMessages),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(LoadError::MessagesNotArray),
        };
        let messages = raw_messages
            .iter()
            .enumerate()
            .map(|(index, raw)| message_from_value(index, raw))
            .collect();
        let tools = doc.get("tools").map(ToolCatalog::from_value);
        Ok(Self { messages, tools })
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Tools declared inside the document itself, if the `tools` key exists.
    pub fn declared_tools(&self) -> Option<&ToolCatalog> {
        self.tools.as_ref()
    }

    /// Content of message 0 when it is the system message.
    pub fn system_text(&self) -> &str {
        match self.messages.first() {
            Some(m) if m.role == Role::System => m.text(),
            _ => "",
        }
    }

    /// The designated first user message (position 1).
    pub fn first_user(&self) -> Option<&Message> {
        self.messages.get(1)
    }

    pub fn user_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role == Role::User)
    }

    pub fn calls(&self) -> impl Iterator<Item = (&Message, &ToolInvocation)> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .filter_map(|m| m.invocation.as_ref().map(|inv| (m, inv)))
    }

    pub fn function_results(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role == Role::Function)
    }
}

fn message_from_value(index: usize, raw: &Value) -> Message {
    let role = Role::parse(raw.get("role").and_then(Value::as_str).unwrap_or_default());
    let invocation = raw.get("function_call").and_then(|call| {
        let name = call.get("name")?.as_str()?.trim().to_string();
        Some(ToolInvocation {
            name,
            arguments: Arguments::from_field(call.get("arguments")),
        })
    });
    Message {
        index,
        role,
        content: Content::from_field(raw.get("content")),
        name: raw
            .get("name")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string()),
        invocation,
    }
}
