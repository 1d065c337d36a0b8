// External tool detection (yt-dlp, ffmpeg)

use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::errors::DownloadError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

/// How to invoke yt-dlp: a binary, or `python3 -m yt_dlp`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YtDlpCommand {
    pub program: String,
    pub prefix_args: Vec<String>,
}

impl YtDlpCommand {
    pub fn binary(path: impl Into<String>) -> Self {
        Self {
            program: path.into(),
            prefix_args: Vec::new(),
        }
    }

    pub fn python_module(python: impl Into<String>) -> Self {
        Self {
            program: python.into(),
            prefix_args: vec!["-m".to_string(), "yt_dlp".to_string()],
        }
    }

    /// Full argument list with the module prefix prepended
    pub fn args(&self, args: Vec<String>) -> Vec<String> {
        let mut full = self.prefix_args.clone();
        full.extend(args);
        full
    }
}

impl std::fmt::Display for YtDlpCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.prefix_args.is_empty() {
            write!(f, "{}", self.program)
        } else {
            write!(f, "{} {}", self.program, self.prefix_args.join(" "))
        }
    }
}

pub struct ToolManager;

impl ToolManager {
    pub fn new() -> Self {
        Self
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let name = tool_type.as_str().to_string();
        let (path, version) = self.detect_tool(tool_type);

        ToolInfo {
            name,
            tool_type,
            version,
            is_available: path.is_some(),
            path,
        }
    }

    pub fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp),
            self.get_tool_info(ToolType::Ffmpeg),
        ]
    }

    /// Pick the yt-dlp invocation: explicit path, installed binary, then the python module
    pub fn resolve_ytdlp(&self, explicit: Option<&str>) -> Result<YtDlpCommand, DownloadError> {
        if let Some(path) = explicit {
            if self.get_version(path, ToolType::YtDlp).is_some() {
                return Ok(YtDlpCommand::binary(path));
            }
            return Err(DownloadError::ToolNotFound(format!("yt-dlp at {}", path)));
        }

        if let (Some(path), _) = self.detect_tool(ToolType::YtDlp) {
            return Ok(YtDlpCommand::binary(path));
        }

        let python = python_cmd();
        if python_has_module(&python, "yt_dlp") {
            debug!("yt-dlp binary missing, using {} -m yt_dlp", python);
            return Ok(YtDlpCommand::python_module(python));
        }

        Err(DownloadError::ToolNotFound(
            "yt-dlp (install with `pip install yt-dlp` or your package manager)".to_string(),
        ))
    }

    fn detect_tool(&self, tool_type: ToolType) -> (Option<String>, Option<String>) {
        let binary_name = tool_type.as_str();

        // 1. Try common paths first
        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary_name),
            format!("/usr/local/bin/{}", binary_name),
            format!("/usr/bin/{}", binary_name),
        ];

        for path in common_paths {
            if Path::new(&path).exists() {
                let version = self.get_version(&path, tool_type);
                return (Some(path), version);
            }
        }

        // 2. Try PATH
        if let Some(version) = self.get_version(binary_name, tool_type) {
            return (Some(binary_name.to_string()), Some(version));
        }

        (None, None)
    }

    fn get_version(&self, path: &str, tool_type: ToolType) -> Option<String> {
        match Command::new(path).arg(tool_type.version_arg()).output() {
            Ok(output) if output.status.success() => {
                let out = String::from_utf8_lossy(&output.stdout);
                // ffmpeg prints a banner; keep the first line only
                out.lines().next().map(|l| l.trim().to_string())
            }
            _ => None,
        }
    }
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Python interpreter for module mode; `YTDLP_PYTHON` points at a venv if needed
fn python_cmd() -> String {
    std::env::var("YTDLP_PYTHON").unwrap_or_else(|_| "python3".to_string())
}

fn python_has_module(python: &str, module: &str) -> bool {
    let code = format!("import {}", module);
    match Command::new(python).args(["-c", &code]).output() {
        Ok(out) => out.status.success(),
        Err(_) => false,
    }
}
