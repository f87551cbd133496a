//! Training-data tooling: turn saved poses into fine-tuning records and check
//! chat-format JSONL before upload.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::PoseError;
use crate::normalize::Normalizer;
use crate::pose::Pose;

/// Description attached to poses exported without a label.
pub const UNLABELED_DESCRIPTION: &str = "This is an unlabeled pose sample. It is provided solely to help the model learn the natural constraints and patterns of MMD bone rotations, positions, and facial morphs. No semantic description is associated with this pose.";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert in MMD (MikuMikuDance) pose generation. Given a description of a pose, you generate the corresponding bone rotations, positions, and facial morphs in JSON format.";

const COMPLETION_SEPARATOR: &str = "JSON: ";
const END_OF_TEXT: &str = "<|endoftext|>";
const ROLES: &[&str] = &["system", "user", "assistant"];

#[derive(Clone, Debug, PartialEq)]
pub struct TrainingSample {
    pub description: String,
    pub pose: Pose,
}

impl TrainingSample {
    /// Uses the pose's own description, or the unlabeled one.
    pub fn from_pose(pose: Pose) -> Self {
        let description = pose
            .description
            .clone()
            .unwrap_or_else(|| UNLABELED_DESCRIPTION.to_string());
        Self { description, pose }
    }

    /// `{ messages: [system, user, assistant] }`; the assistant turn carries
    /// the pose without its description.
    pub fn to_chat_example(&self, system: &str) -> Result<ChatExample, PoseError> {
        let mut doc = self.pose.to_wire();
        doc.description = None;
        let answer =
            serde_json::to_string(&doc).map_err(|e| PoseError::Serialize(e.to_string()))?;
        Ok(ChatExample {
            messages: vec![
                ChatMessage::new("system", system),
                ChatMessage::new(
                    "user",
                    format!("Generate MMD pose data for: {}", self.description),
                ),
                ChatMessage::new("assistant", answer),
            ],
        })
    }

    /// Single-string completion record: `Description: ...\nJSON: {...}<|endoftext|>`.
    pub fn to_completion_text(&self) -> Result<String, PoseError> {
        let mut doc = self.pose.to_wire();
        doc.description = Some(self.description.clone());
        let json =
            serde_json::to_string(&doc).map_err(|e| PoseError::Serialize(e.to_string()))?;
        Ok(format!(
            "Description: {}\n{COMPLETION_SEPARATOR}{json}{END_OF_TEXT}",
            self.description
        ))
    }
}

/// Split a completion record into its prompt (`Description: ...`) and target
/// JSON parts.
pub fn split_completion_text(text: &str) -> Option<(&str, &str)> {
    let (prompt, target) = text.split_once(COMPLETION_SEPARATOR)?;
    Some((prompt.trim(), target.trim()))
}

/// Rough token count: whitespace-separated words plus characters / 4.
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count() + text.chars().count() / 4
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatExample {
    pub messages: Vec<ChatMessage>,
}

/// One JSON object per line.
pub fn write_chat_jsonl(samples: &[TrainingSample], system: &str) -> Result<String, PoseError> {
    let mut out = String::new();
    for sample in samples {
        let example = sample.to_chat_example(system)?;
        let line =
            serde_json::to_string(&example).map_err(|e| PoseError::Serialize(e.to_string()))?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineIssue {
    InvalidJson { line: usize },
    MissingMessages { line: usize },
    MessagesNotList { line: usize },
    MissingRoleOrContent { line: usize },
    InvalidRole { line: usize, role: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DatasetReport {
    pub total_lines: usize,
    pub valid_examples: usize,
    /// Characters / 4 over the message contents of valid lines.
    pub estimated_tokens: usize,
    pub issues: Vec<LineIssue>,
}

impl DatasetReport {
    pub fn is_valid(&self) -> bool {
        self.valid_examples == self.total_lines
    }
}

/// Structural check of a chat-format JSONL file. Lines are numbered from 1.
pub fn validate_chat_jsonl(text: &str) -> DatasetReport {
    let mut report = DatasetReport::default();
    for (i, raw) in text.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        report.total_lines += 1;
        match check_line(i + 1, raw) {
            Ok(chars) => {
                report.valid_examples += 1;
                report.estimated_tokens += chars / 4;
            }
            Err(issue) => {
                log::warn!("dataset line {}: {issue:?}", i + 1);
                report.issues.push(issue);
            }
        }
    }
    report
}

fn check_line(line: usize, raw: &str) -> Result<usize, LineIssue> {
    let value: JsonValue =
        serde_json::from_str(raw.trim()).map_err(|_| LineIssue::InvalidJson { line })?;
    let messages = value
        .get("messages")
        .ok_or(LineIssue::MissingMessages { line })?
        .as_array()
        .ok_or(LineIssue::MessagesNotList { line })?;

    let mut chars = 0;
    for msg in messages {
        let (Some(role), Some(content)) = (msg.get("role"), msg.get("content")) else {
            return Err(LineIssue::MissingRoleOrContent { line });
        };
        let role = role.as_str().unwrap_or_default();
        if !ROLES.contains(&role) {
            return Err(LineIssue::InvalidRole {
                line,
                role: role.to_string(),
            });
        }
        chars += content.as_str().map_or(0, |c| c.chars().count());
    }
    Ok(chars)
}

/// Load every `*.json` pose file in `dir` (sorted by file name). Files that are
/// not JSON are skipped with a warning; field-level problems are normalized away.
/// A path that is not a directory is a [`PoseError::Dataset`].
pub fn load_samples_from_dir(
    dir: impl AsRef<Path>,
    normalizer: &Normalizer,
) -> Result<Vec<TrainingSample>, PoseError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(PoseError::Dataset(format!(
            "{} is not a directory",
            dir.display()
        )));
    }
    let io_err = |source: std::io::Error| PoseError::Io {
        path: dir.display().to_string(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut samples = Vec::with_capacity(paths.len());
    for path in paths {
        let text = std::fs::read_to_string(&path).map_err(|source| PoseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match normalizer.normalize_pose_str(&text) {
            Ok(normalized) => samples.push(TrainingSample::from_pose(normalized.value)),
            Err(e) => log::warn!("skipping {}: {e}", path.display()),
        }
    }
    log::debug!("loaded {} pose samples from {}", samples.len(), dir.display());
    Ok(samples)
}
