//! `adb`-backed device bridge.
//!
//! Every call shells out to `adb [-s SERIAL] ...` and waits for it to
//! finish. Hierarchy capture tries the fast path first (dump straight to
//! stdout) and falls back to dumping into a file on the device and reading
//! it back, which works on images where `/dev/tty` is not writable.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use uiprobe_core::bridge::{BridgeError, DeviceBridge};
use uiprobe_core::error::ApiError;
use uiprobe_core::node::Point;
use uiprobe_core::strategy::{run_strategies, Strategy};

/// Where the fallback capture writes its dump on the device.
const DEVICE_DUMP_PATH: &str = "/sdcard/window_dump.xml";

/// Runs adb against one device.
#[derive(Debug, Clone)]
pub struct Adb {
    program: String,
    serial: Option<String>,
}

impl Adb {
    pub fn new(program: impl Into<String>, serial: Option<String>) -> Self {
        Self {
            program: program.into(),
            serial,
        }
    }

    fn command_line(&self, args: &[&str]) -> String {
        let mut line = self.program.clone();
        if let Some(serial) = &self.serial {
            line.push_str(" -s ");
            line.push_str(serial);
        }
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Run adb with `args` and return its stdout.
    pub async fn run(&self, args: &[&str]) -> Result<String, BridgeError> {
        let command = self.command_line(args);
        debug!("Running {}", command);

        let mut cmd = Command::new(&self.program);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        let output = cmd
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    BridgeError::Unavailable(format!("'{}' not found on PATH", self.program))
                } else {
                    BridgeError::Io {
                        command: command.clone(),
                        source,
                    }
                }
            })?;

        if !output.status.success() {
            return Err(BridgeError::CommandFailed {
                command,
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// `uiautomator dump /dev/tty`, read from stdout.
struct StdoutDump(Adb);

#[async_trait]
impl Strategy<String> for StdoutDump {
    fn name(&self) -> &str {
        "dump to stdout"
    }

    async fn attempt(&self) -> Result<String, ApiError> {
        let out = self
            .0
            .run(&["exec-out", "uiautomator", "dump", "/dev/tty"])
            .await?;
        require_hierarchy(out)
    }
}

/// Dump to a file on the device, then `cat` it.
struct FileDump(Adb);

#[async_trait]
impl Strategy<String> for FileDump {
    fn name(&self) -> &str {
        "dump to file"
    }

    async fn attempt(&self) -> Result<String, ApiError> {
        self.0
            .run(&["shell", "uiautomator", "dump", DEVICE_DUMP_PATH])
            .await?;
        let out = self.0.run(&["exec-out", "cat", DEVICE_DUMP_PATH]).await?;
        require_hierarchy(out)
    }
}

/// uiautomator exits 0 even when it could not dump (e.g. "ERROR: null root
/// node returned by UiTestAutomationBridge").
fn require_hierarchy(out: String) -> Result<String, ApiError> {
    if out.contains("<hierarchy") {
        Ok(out)
    } else {
        let first_line = out.lines().next().unwrap_or("").trim();
        Err(ApiError::device(format!(
            "uiautomator produced no hierarchy: {}",
            if first_line.is_empty() { "empty output" } else { first_line }
        )))
    }
}

pub struct AdbBridge {
    adb: Adb,
    capture: Vec<Box<dyn Strategy<String>>>,
}

impl AdbBridge {
    pub fn new(program: impl Into<String>, serial: Option<String>) -> Self {
        let adb = Adb::new(program, serial);
        let capture: Vec<Box<dyn Strategy<String>>> = vec![
            Box::new(StdoutDump(adb.clone())),
            Box::new(FileDump(adb.clone())),
        ];
        Self { adb, capture }
    }

    async fn input(&self, args: &[&str]) -> Result<(), BridgeError> {
        let mut full = vec!["shell", "input"];
        full.extend_from_slice(args);
        self.adb.run(&full).await.map(|_| ())
    }
}

#[async_trait]
impl DeviceBridge for AdbBridge {
    async fn capture_hierarchy(&self) -> Result<String, BridgeError> {
        run_strategies(&self.capture)
            .await
            .map_err(|e| BridgeError::Unavailable(e.message))
    }

    async fn tap(&self, at: Point) -> Result<(), BridgeError> {
        self.input(&["tap", &at.x.to_string(), &at.y.to_string()]).await
    }

    async fn swipe(&self, from: Point, to: Point, duration_ms: u64) -> Result<(), BridgeError> {
        self.input(&[
            "swipe",
            &from.x.to_string(),
            &from.y.to_string(),
            &to.x.to_string(),
            &to.y.to_string(),
            &duration_ms.to_string(),
        ])
        .await
    }

    async fn input_text(&self, text: &str) -> Result<(), BridgeError> {
        let escaped = escape_input_text(text);
        self.input(&["text", &escaped]).await
    }

    async fn key_event(&self, code: u32) -> Result<(), BridgeError> {
        self.input(&["keyevent", &code.to_string()]).await
    }
}

/// Escape text for `adb shell input text`.
///
/// The argument goes through the device shell, and `input` itself reads
/// `%s` as a space.
pub fn escape_input_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for ch in text.chars() {
        match ch {
            ' ' => out.push_str("%s"),
            '\\' | '"' | '\'' | '`' | '$' | '&' | '|' | ';' | '<' | '>' | '(' | ')' | '*'
            | '?' | '~' | '#' | '!' | '%' | '[' | ']' | '{' | '}' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}
