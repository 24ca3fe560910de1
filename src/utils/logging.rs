//! Plain-text transcript of a chat session.

use chrono::Local;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct LoggingState {
    file_path: Option<PathBuf>,
}

impl LoggingState {
    pub fn disabled() -> Self {
        LoggingState { file_path: None }
    }

    /// Enable transcript logging, failing early if `path` is not writable.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.into();
        test_file_access(&path)?;
        Ok(LoggingState {
            file_path: Some(path),
        })
    }

    pub fn log_session_start(&self, model: &str) -> Result<(), Box<dyn std::error::Error>> {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        self.write_block(&format!("## Session started {stamp} with {model}"))
    }

    pub fn log_user(&self, text: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.write_block(&format!("You: {text}"))
    }

    pub fn log_assistant(&self, reply: &str) -> Result<(), Box<dyn std::error::Error>> {
        if reply.is_empty() {
            return Ok(());
        }
        self.write_block(reply)
    }

    pub fn log_note(&self, note: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.write_block(&format!("## {note}"))
    }

    pub fn status(&self) -> String {
        match &self.file_path {
            None => "disabled".to_string(),
            Some(path) => format!(
                "active ({})",
                Path::new(path)
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
            ),
        }
    }

    fn write_block(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = self.file_path.as_ref() else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::new(file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        // Blank line between entries, matching the screen.
        writeln!(writer)?;

        writer.flush()?;
        Ok(())
    }
}

fn test_file_access(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn disabled_logger_writes_nothing() {
        let logging = LoggingState::disabled();
        logging.log_user("hi").unwrap();
        assert_eq!(logging.status(), "disabled");
    }

    #[test]
    fn transcript_records_turns_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chat.log");
        let logging = LoggingState::new(&path).expect("enable logging");

        logging.log_session_start("llama3").unwrap();
        logging.log_user("write a haiku").unwrap();
        logging.log_assistant("line one\nline two").unwrap();
        logging.log_assistant("").unwrap();
        logging.log_note("Context reset").unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let after_header = text.split_once('\n').unwrap().1;
        assert!(text.starts_with("## Session started "));
        assert!(text.lines().next().unwrap().ends_with("with llama3"));
        assert_eq!(
            after_header,
            "\nYou: write a haiku\n\nline one\nline two\n\n## Context reset\n\n"
        );
        assert_eq!(logging.status(), "active (chat.log)");
    }

    #[test]
    fn unwritable_path_is_rejected_up_front() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = LoggingState::new(dir.path().join("missing-dir").join("chat.log"));
        assert!(result.is_err());
    }
}
