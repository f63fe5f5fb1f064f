//! Index of every literal value a tool call could legitimately reference.
//!
//! The index is folded left to right over the transcript. System and user
//! values are visible everywhere; a tool-result value is visible only to
//! calls at a strictly greater message index. Callers query through
//! [`ValueIndex::resolve`] and the containment helpers, never the raw map.

use crate::core::config::ValidatorConfig;
use crate::core::transcript::{Content, Role, Transcript};
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

/// Declared type of an indexed scalar. Matching always uses the string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "str"),
            ValueType::Integer => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Boolean => write!(f, "bool"),
        }
    }
}

/// String form and declared type of a scalar JSON value. `null` and
/// containers have none.
pub fn scalar_key(value: &Value) -> Option<(String, ValueType)> {
    match value {
        Value::String(s) => Some((s.clone(), ValueType::String)),
        Value::Number(n) if n.is_f64() => Some((n.to_string(), ValueType::Float)),
        Value::Number(n) => Some((n.to_string(), ValueType::Integer)),
        Value::Bool(b) => Some((b.to_string(), ValueType::Boolean)),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// How a value was found in the system message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SystemValue {
    Credential { name: String },
    CredentialRaw { name: String },
    Model,
    ToolName,
}

/// Which user-message extractor produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Extractor {
    Quoted,
    CompoundId,
    Email,
    Date,
    Time,
    Timezone,
    Duration,
    Number,
    Term,
    Identifier,
    Name,
    Word,
}

impl fmt::Display for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Extractor::Quoted => "quoted",
            Extractor::CompoundId => "compound id",
            Extractor::Email => "email",
            Extractor::Date => "date",
            Extractor::Time => "time",
            Extractor::Timezone => "timezone",
            Extractor::Duration => "duration",
            Extractor::Number => "number",
            Extractor::Term => "exam term",
            Extractor::Identifier => "identifier",
            Extractor::Name => "name/title",
            Extractor::Word => "word",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Origin {
    SystemMessage {
        value: SystemValue,
    },
    UserMessage {
        index: usize,
        extractor: Extractor,
    },
    ToolOutput {
        message_index: usize,
        tool_name: String,
        path: String,
    },
}

impl Origin {
    /// Tool-result values are only known after their message.
    pub fn visible_at(&self, as_of: usize) -> bool {
        match self {
            Origin::ToolOutput { message_index, .. } => *message_index < as_of,
            _ => true,
        }
    }

    /// Higher wins when several origins share a key.
    fn specificity(&self) -> u8 {
        match self {
            Origin::ToolOutput { .. } => 3,
            Origin::SystemMessage { .. } => 2,
            Origin::UserMessage {
                extractor: Extractor::Word | Extractor::Name,
                ..
            } => 0,
            Origin::UserMessage { .. } => 1,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::SystemMessage { value } => match value {
                SystemValue::Credential { name } => write!(f, "system message token ({})", name),
                SystemValue::CredentialRaw { name } => {
                    write!(f, "system message token ({} - raw)", name)
                }
                SystemValue::Model => write!(f, "system message (model)"),
                SystemValue::ToolName => write!(f, "system message (available tool)"),
            },
            Origin::UserMessage { index, extractor } => {
                write!(f, "user message {} ({})", index, extractor)
            }
            Origin::ToolOutput {
                tool_name, path, ..
            } => {
                if path.is_empty() {
                    write!(f, "{} output (direct value)", tool_name)
                } else {
                    write!(f, "{} output ({})", tool_name, path)
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexEntry {
    pub raw: String,
    pub value_type: ValueType,
    pub origin: Origin,
}

/// A parsed tool result retained for containment checks.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub message_index: usize,
    pub tool_name: String,
    pub serialized: String,
    pub leaf_count: usize,
}

/// Where a containment match was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextHit {
    System,
    User(usize),
}

#[derive(Debug, Default)]
pub struct ValueIndex {
    entries: FxHashMap<String, Vec<IndexEntry>>,
    /// Keys in first-insertion order, for deterministic iteration.
    order: Vec<String>,
    system_text: String,
    user_texts: Vec<(usize, String)>,
    outputs: Vec<ToolOutput>,
    unparsed_outputs: Vec<(usize, String)>,
}

impl ValueIndex {
    pub fn build(transcript: &Transcript, config: &ValidatorConfig) -> Self {
        let mut index = ValueIndex::default();
        for message in transcript.messages() {
            match message.role {
                Role::System if message.index == 0 => {
                    index.system_text = message.text().to_string();
                    index.add_system(message.text(), config);
                }
                Role::User => index.add_user(message.index, message.text()),
                Role::Function => {
                    let tool_name = message.name.clone().unwrap_or_default();
                    match &message.content {
                        Content::Text(raw) => match serde_json::from_str::<Value>(raw) {
                            Ok(parsed) => index.add_tool_output(message.index, &tool_name, &parsed),
                            Err(_) => index.unparsed_outputs.push((message.index, tool_name)),
                        },
                        Content::NonText(_) | Content::Absent => {
                            index.unparsed_outputs.push((message.index, tool_name))
                        }
                    }
                }
                _ => {}
            }
        }
        index
    }

    fn insert(&mut self, key: String, entry: IndexEntry) {
        if key.is_empty() {
            return;
        }
        match self.entries.get_mut(&key) {
            Some(existing) => {
                // An always-visible entry at least as specific already answers every query.
                let shadowed = !matches!(entry.origin, Origin::ToolOutput { .. })
                    && existing.iter().any(|e| {
                        !matches!(e.origin, Origin::ToolOutput { .. })
                            && e.origin.specificity() >= entry.origin.specificity()
                    });
                if !shadowed {
                    existing.push(entry);
                }
            }
            None => {
                self.order.push(key.clone());
                self.entries.insert(key, vec![entry]);
            }
        }
    }

    fn add_system(&mut self, text: &str, config: &ValidatorConfig) {
        for (name, value) in credential_lines(text, &config.credentials_header) {
            if let Some(raw) = value.strip_prefix("Bearer ") {
                let raw = raw.trim().to_string();
                self.insert_string(
                    raw,
                    Origin::SystemMessage {
                        value: SystemValue::CredentialRaw { name: name.clone() },
                    },
                );
            }
            self.insert_string(
                value,
                Origin::SystemMessage {
                    value: SystemValue::Credential { name },
                },
            );
        }
        for caps in MODEL_RE.captures_iter(text) {
            self.insert_string(
                caps[1].to_string(),
                Origin::SystemMessage {
                    value: SystemValue::Model,
                },
            );
        }
        for tool in tool_names(text, &config.system_markers.available_tools) {
            self.insert_string(
                tool,
                Origin::SystemMessage {
                    value: SystemValue::ToolName,
                },
            );
        }
    }

    fn add_user(&mut self, index: usize, text: &str) {
        self.user_texts.push((index, text.to_string()));
        for (extractor, extract) in USER_EXTRACTORS {
            for value in extract(text) {
                self.insert_string(
                    value,
                    Origin::UserMessage {
                        index,
                        extractor: *extractor,
                    },
                );
            }
        }
    }

    fn insert_string(&mut self, value: String, origin: Origin) {
        let entry = IndexEntry {
            raw: value.clone(),
            value_type: ValueType::String,
            origin,
        };
        self.insert(value, entry);
    }

    /// Register every scalar leaf of a parsed tool result.
    fn add_tool_output(&mut self, message_index: usize, tool_name: &str, output: &Value) {
        let leaves = walk_leaves(output);
        let leaf_count = leaves.len();
        for (path, leaf) in leaves {
            if let Some((key, value_type)) = scalar_key(leaf) {
                let entry = IndexEntry {
                    raw: key.clone(),
                    value_type,
                    origin: Origin::ToolOutput {
                        message_index,
                        tool_name: tool_name.to_string(),
                        path,
                    },
                };
                self.insert(key, entry);
            }
        }
        self.outputs.push(ToolOutput {
            message_index,
            tool_name: tool_name.to_string(),
            serialized: output.to_string(),
            leaf_count,
        });
    }

    /// The best entry for `value` visible to a call at message `as_of`:
    /// most specific origin first, earliest on ties.
    pub fn resolve(&self, value: &str, as_of: usize) -> Option<&IndexEntry> {
        let mut best: Option<&IndexEntry> = None;
        for entry in self.entries.get(value)? {
            if !entry.origin.visible_at(as_of) {
                continue;
            }
            if best.is_none_or(|b| entry.origin.specificity() > b.origin.specificity()) {
                best = Some(entry);
            }
        }
        best
    }

    /// Substring search over the system message, then each user message.
    pub fn find_in_text(&self, value: &str) -> Option<TextHit> {
        if value.is_empty() {
            return None;
        }
        if self.system_text.contains(value) {
            return Some(TextHit::System);
        }
        self.user_texts
            .iter()
            .find(|(_, text)| text.contains(value))
            .map(|(index, _)| TextHit::User(*index))
    }

    /// First visible tool result whose serialized JSON contains `value`.
    pub fn find_in_outputs(&self, value: &str, as_of: usize) -> Option<&ToolOutput> {
        if value.is_empty() {
            return None;
        }
        self.outputs
            .iter()
            .filter(|o| o.message_index < as_of)
            .find(|o| o.serialized.contains(value))
    }

    /// Visible keys that occur inside `text`, in first-insertion order.
    pub fn known_values_in(&self, text: &str, as_of: usize) -> Vec<&str> {
        self.order
            .iter()
            .filter(|key| {
                self.entries
                    .get(key.as_str())
                    .is_some_and(|es| es.iter().any(|e| e.origin.visible_at(as_of)))
            })
            .filter(|key| text.contains(key.as_str()))
            .map(String::as_str)
            .collect()
    }

    pub fn outputs(&self) -> &[ToolOutput] {
        &self.outputs
    }

    /// Function messages whose content did not parse, as `(message index, tool name)`.
    pub fn unparsed_outputs(&self) -> &[(usize, String)] {
        &self.unparsed_outputs
    }

    pub fn output_value_count(&self) -> usize {
        self.outputs.iter().map(|o| o.leaf_count).sum()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Scalar leaves of `root` with their structural paths (`data.deals[0].id`).
/// Uses an explicit stack so arbitrarily deep payloads cannot overflow.
pub fn walk_leaves(root: &Value) -> Vec<(String, &Value)> {
    let mut leaves = Vec::new();
    let mut stack: Vec<(String, &Value)> = vec![(String::new(), root)];
    while let Some((path, value)) = stack.pop() {
        match value {
            Value::Object(map) => {
                // Reverse push keeps pre-order output.
                for (key, child) in map.iter().rev() {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };
                    stack.push((child_path, child));
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate().rev() {
                    stack.push((format!("{}[{}]", path, i), child));
                }
            }
            Value::Null => {}
            scalar => leaves.push((path, scalar)),
        }
    }
    leaves
}

/// Body of a `**Header**:` section, up to the next line that opens with `**`.
pub fn section_after<'a>(text: &'a str, header: &str) -> Option<&'a str> {
    let start = text.find(header)? + header.len();
    let body = text[start..].strip_prefix(':').unwrap_or(&text[start..]);
    let end = body.find("\n**").unwrap_or(body.len());
    Some(&body[..end])
}

static CREDENTIAL_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*-\s*([A-Za-z0-9_ ]*?)\s*(Token|API Key|JWT|OAuth|Bearer|Key|Secret)\s*:\s*([A-Za-z0-9_.\- ]+)",
    )
    .unwrap()
});

/// `(label, value)` pairs from the credentials section of `text`.
pub fn credential_lines(text: &str, header: &str) -> Vec<(String, String)> {
    let Some(section) = section_after(text, header) else {
        return Vec::new();
    };
    section
        .lines()
        .filter_map(|line| {
            let caps = CREDENTIAL_LINE_RE.captures(line)?;
            let label = format!("{} {}", caps[1].trim(), &caps[2]).trim().to_string();
            let value = caps[3].trim().to_string();
            (!value.is_empty()).then_some((label, value))
        })
        .collect()
}

static MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)model\s*:\s*([a-zA-Z0-9\-_]+)").unwrap());

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z_][a-zA-Z0-9_]*").unwrap());

/// Identifiers listed after the available-tools marker, up to the first period.
fn tool_names(text: &str, marker: &str) -> Vec<String> {
    let Ok(re) = Regex::new(&format!(r"(?i){}:?\s*([^.]+)", regex::escape(marker))) else {
        return Vec::new();
    };
    let Some(caps) = re.captures(text) else {
        return Vec::new();
    };
    IDENT_RE
        .find_iter(&caps[1])
        .map(|m| m.as_str().to_string())
        .collect()
}

type ExtractFn = fn(&str) -> Vec<String>;

/// User-message extractors, run in order over the same text.
const USER_EXTRACTORS: &[(Extractor, ExtractFn)] = &[
    (Extractor::Quoted, extract_quoted),
    (Extractor::CompoundId, extract_compound_ids),
    (Extractor::Email, extract_emails),
    (Extractor::Date, extract_dates),
    (Extractor::Time, extract_times),
    (Extractor::Timezone, extract_timezones),
    (Extractor::Duration, extract_durations),
    (Extractor::Number, extract_numbers),
    (Extractor::Term, extract_terms),
    (Extractor::Identifier, extract_identifiers),
    (Extractor::Name, extract_names),
    (Extractor::Word, extract_words),
];

fn first_groups(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"["']([^"']+)["']"#).unwrap());
static COMPOUND_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{2,}[0-9]{2,})\b").unwrap());
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})\b").unwrap()
});
static DATE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b((?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4})\b").unwrap(),
        Regex::new(r"\b(\d{1,2}/\d{1,2}/\d{4})\b").unwrap(),
        Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap(),
        Regex::new(r"\b(\d{1,2}-\d{1,2}-\d{4})\b").unwrap(),
    ]
});
static TIME_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(\d{1,2}:\d{2}\s*(?:AM|PM))\b").unwrap(),
        Regex::new(r"\b(\d{1,2}:\d{2}:\d{2})\b").unwrap(),
        Regex::new(r"\b(\d{1,2}:\d{2})\b").unwrap(),
    ]
});
static TIMEZONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(UTC|EST|PST|CST|MST|GMT|EDT|PDT|CDT|MDT)\b").unwrap());
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d+)\s*(?:minutes?|hours?|days?|mins?|hrs?)\b").unwrap()
});
static TERM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(Final\s+Exam|Midterm\s+Exam|Quiz\s+\d+|Test\s+\d+|Assignment\s+\d+)\b").unwrap()
});
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{2,})\b").unwrap());
static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z0-9_.\-]{6,})\b").unwrap());
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)\b").unwrap());
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([A-Za-z0-9]+)\b").unwrap());

const NAME_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "that", "this", "schedule", "arrange", "exam", "test",
    "course", "student", "students",
];

pub fn extract_quoted(text: &str) -> Vec<String> {
    first_groups(&QUOTED_RE, text)
}

pub fn extract_compound_ids(text: &str) -> Vec<String> {
    first_groups(&COMPOUND_ID_RE, text)
}

pub fn extract_emails(text: &str) -> Vec<String> {
    first_groups(&EMAIL_RE, text)
}

pub fn extract_dates(text: &str) -> Vec<String> {
    DATE_RES.iter().flat_map(|re| first_groups(re, text)).collect()
}

pub fn extract_times(text: &str) -> Vec<String> {
    TIME_RES.iter().flat_map(|re| first_groups(re, text)).collect()
}

pub fn extract_timezones(text: &str) -> Vec<String> {
    first_groups(&TIMEZONE_RE, text)
}

pub fn extract_durations(text: &str) -> Vec<String> {
    first_groups(&DURATION_RE, text)
}

/// Course terms such as `Final Exam` or `Quiz 3`.
pub fn extract_terms(text: &str) -> Vec<String> {
    first_groups(&TERM_RE, text)
}

pub fn extract_numbers(text: &str) -> Vec<String> {
    first_groups(&NUMBER_RE, text)
}

pub fn extract_identifiers(text: &str) -> Vec<String> {
    first_groups(&IDENTIFIER_RE, text)
}

pub fn extract_names(text: &str) -> Vec<String> {
    first_groups(&NAME_RE, text)
        .into_iter()
        .filter(|name| !NAME_STOP_WORDS.contains(&name.to_lowercase().as_str()))
        .collect()
}

pub fn extract_words(text: &str) -> Vec<String> {
    first_groups(&WORD_RE, text)
        .into_iter()
        .filter(|word| word.chars().count() >= 3)
        .collect()
}
