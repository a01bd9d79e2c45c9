//! Parsing of the agent CLI's `stream-json` output.

use serde::Deserialize;
use serde_json::Value;

/// Events from the agent CLI's stream-json output format
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "assistant")]
    Assistant { message: AssistantMessage },

    #[serde(rename = "user")]
    User {},

    #[serde(rename = "result")]
    Result {
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        is_error: bool,
    },

    #[serde(rename = "system")]
    System {},
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "tool_use")]
    ToolUse { name: String, input: Value },

    #[serde(rename = "text")]
    Text { text: String },

    #[serde(other)]
    Unknown,
}

/// What a single output line contributed, for live display.
#[derive(Debug, PartialEq, Eq)]
pub enum LineActivity {
    ToolUse(String),
    Text(String),
    None,
}

/// Accumulates the combined output of one agent run.
///
/// Assistant text and non-JSON lines are concatenated; a final `result`
/// event, when present, is appended last so completion markers in it are
/// always seen.
#[derive(Debug, Default)]
pub struct StreamCollector {
    text: String,
    final_result: Option<String>,
    pub is_error: bool,
}

impl StreamCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) -> LineActivity {
        if line.trim().is_empty() {
            return LineActivity::None;
        }
        match serde_json::from_str::<StreamEvent>(line) {
            Ok(StreamEvent::Assistant { message }) => {
                let mut activity = LineActivity::None;
                for block in message.content {
                    match block {
                        ContentBlock::ToolUse { name, input } => {
                            activity = LineActivity::ToolUse(describe_tool_use(&name, &input));
                        }
                        ContentBlock::Text { text } => {
                            self.text.push_str(&text);
                            self.text.push('\n');
                            activity = LineActivity::Text(truncate_thinking(&text, 60));
                        }
                        ContentBlock::Unknown => {}
                    }
                }
                activity
            }
            Ok(StreamEvent::Result { result, is_error }) => {
                self.final_result = result;
                self.is_error = is_error;
                LineActivity::None
            }
            Ok(StreamEvent::User { .. }) | Ok(StreamEvent::System { .. }) => LineActivity::None,
            Err(_) => {
                // Not stream-json; keep it verbatim
                self.text.push_str(line);
                self.text.push('\n');
                LineActivity::None
            }
        }
    }

    pub fn push_stderr(&mut self, stderr: &str) {
        if !stderr.trim().is_empty() {
            self.text.push_str(stderr);
            if !stderr.ends_with('\n') {
                self.text.push('\n');
            }
        }
    }

    /// The combined output stream the completion markers are searched in.
    pub fn finish(self) -> String {
        match self.final_result {
            Some(result) => {
                let mut combined = self.text;
                combined.push_str(&result);
                combined
            }
            None => self.text,
        }
    }
}

/// Extract a human-readable description from a tool use event
pub fn describe_tool_use(name: &str, input: &Value) -> String {
    let field = |key: &str| input.get(key).and_then(|v| v.as_str());
    match name {
        "Read" => format!("Reading: {}", field("file_path").map(shorten_path).unwrap_or_else(|| "file".into())),
        "Write" => format!("Creating: {}", field("file_path").map(shorten_path).unwrap_or_else(|| "file".into())),
        "Edit" => format!("Editing: {}", field("file_path").map(shorten_path).unwrap_or_else(|| "file".into())),
        "Bash" => format!("Running: {}", field("command").map(|s| truncate_str(s, 40)).unwrap_or_else(|| "command".into())),
        "Grep" | "Glob" => format!("Searching: {}", field("pattern").map(|s| truncate_str(s, 30)).unwrap_or_else(|| "*".into())),
        _ => name.to_string(),
    }
}

/// Shorten a file path to just the last 2 components
fn shorten_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() <= 2 {
        path.to_string()
    } else {
        parts[parts.len() - 2..].join("/")
    }
}

/// Truncate a string with ellipsis, respecting char boundaries
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Truncate thinking text to a reasonable snippet
pub fn truncate_thinking(text: &str, max_len: usize) -> String {
    let first_line = text.lines().next().unwrap_or(text);
    truncate_str(first_line.trim(), max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_assistant_text_and_result() {
        let mut c = StreamCollector::new();
        c.push_line(r#"{"type":"system","subtype":"init"}"#);
        let act = c.push_line(
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Working on it"}]},"session_id":"abc"}"#,
        );
        assert_eq!(act, LineActivity::Text("Working on it".to_string()));
        c.push_line(
            r#"{"type":"result","subtype":"success","result":"All done.\nIMPLEMENTATION COMPLETE","is_error":false}"#,
        );
        let out = c.finish();
        assert!(out.starts_with("Working on it\n"));
        assert!(out.ends_with("IMPLEMENTATION COMPLETE"));
    }

    #[test]
    fn test_tool_use_is_described_not_collected() {
        let mut c = StreamCollector::new();
        let act = c.push_line(
            r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Read","input":{"file_path":"/foo/bar/baz.rs"},"id":"1"}]}}"#,
        );
        assert_eq!(act, LineActivity::ToolUse("Reading: bar/baz.rs".to_string()));
        assert_eq!(c.finish(), "");
    }

    #[test]
    fn test_non_json_lines_kept_verbatim() {
        let mut c = StreamCollector::new();
        c.push_line("plain text output");
        c.push_line("");
        c.push_stderr("warning: something\n");
        assert_eq!(c.finish(), "plain text output\nwarning: something\n");
    }

    #[test]
    fn test_error_result_flagged() {
        let mut c = StreamCollector::new();
        c.push_line(r#"{"type":"result","subtype":"error_max_turns","is_error":true}"#);
        assert!(c.is_error);
    }

    #[test]
    fn test_describe_tool_use() {
        let input = serde_json::json!({"command": "cargo test --release"});
        assert_eq!(
            describe_tool_use("Bash", &input),
            "Running: cargo test --release"
        );
        assert_eq!(describe_tool_use("TodoWrite", &input), "TodoWrite");
    }

    #[test]
    fn test_truncate_multibyte_safe() {
        let s = "é".repeat(50);
        let t = truncate_str(&s, 10);
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), 10);
    }
}
