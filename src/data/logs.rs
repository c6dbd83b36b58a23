// ABOUTME: Recent tool-call log lines from the newest session transcript
// Projects assistant tool_use/text blocks into icon+tool+summary rows

use crate::data::subagent::find_latest_jsonl;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub icon: &'static str,
    pub tool: String,
    pub summary: String,
}

const TAIL_LINES: usize = 200;
const VISIBLE_ENTRIES: usize = 6;
const SUMMARY_MAX_CHARS: usize = 100;

fn tool_icon(tool: &str) -> &'static str {
    match tool {
        "Bash" => "🔧",
        "Read" => "📖",
        "Write" | "Edit" => "✏️",
        "Grep" => "🔍",
        "Glob" => "📁",
        "Task" => "🤖",
        "WebFetch" | "WebSearch" => "🌐",
        "TodoWrite" => "📋",
        "Text" => "💬",
        _ => "⚙️",
    }
}

fn first_string_value(input: &Value) -> Option<String> {
    input.as_object()?.values().find_map(|v| {
        v.as_str()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    })
}

fn extract_summary(name: &str, input: &Value) -> String {
    let field = |key: &str| {
        input
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
    };

    if name == "Bash" {
        if let Some(cmd) = field("command") {
            return cmd;
        }
    }
    field("file_path")
        .or_else(|| field("path"))
        .or_else(|| field("pattern"))
        .or_else(|| field("prompt"))
        .or_else(|| first_string_value(input))
        .unwrap_or_default()
}

/// Stateless poller: re-reads the tail of the newest transcript each pass.
pub struct LogTracker {
    transcripts_dir: PathBuf,
}

impl LogTracker {
    pub fn new(transcripts_dir: PathBuf) -> Self {
        Self { transcripts_dir }
    }

    pub fn recent_logs(&self) -> Vec<LogEntry> {
        let Some(path) = find_latest_jsonl(&self.transcripts_dir) else {
            return Vec::new();
        };
        let Ok(raw) = fs::read_to_string(&path) else {
            return Vec::new();
        };

        let lines: Vec<&str> = raw.lines().collect();
        let tail = lines.len().saturating_sub(TAIL_LINES);
        let mut entries = Vec::new();

        for line in &lines[tail..] {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
                continue;
            };
            if value.get("type").and_then(|t| t.as_str()) != Some("assistant") {
                continue;
            }
            let Some(content) = value
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(|c| c.as_array())
            else {
                continue;
            };

            for block in content {
                match block.get("type").and_then(|t| t.as_str()) {
                    Some("tool_use") => {
                        let name = block
                            .get("name")
                            .and_then(|n| n.as_str())
                            .unwrap_or("Unknown");
                        let summary = block
                            .get("input")
                            .map(|input| extract_summary(name, input))
                            .unwrap_or_default();
                        entries.push(LogEntry {
                            icon: tool_icon(name),
                            tool: name.to_string(),
                            summary: summary.chars().take(SUMMARY_MAX_CHARS).collect(),
                        });
                    }
                    Some("text") => {
                        let Some(text) = block.get("text").and_then(|t| t.as_str()) else {
                            continue;
                        };
                        let first_line = text.trim().lines().next().unwrap_or("");
                        if first_line.chars().count() < 3 {
                            continue;
                        }
                        entries.push(LogEntry {
                            icon: tool_icon("Text"),
                            tool: "Text".to_string(),
                            summary: first_line.chars().take(SUMMARY_MAX_CHARS).collect(),
                        });
                    }
                    _ => {}
                }
            }
        }

        let skip = entries.len().saturating_sub(VISIBLE_ENTRIES);
        entries.split_off(skip)
    }
}
