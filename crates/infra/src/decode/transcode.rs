//! External transcoding through ffmpeg
//!
//! Used for compressed formats the in-process decoder rejects. The ffmpeg
//! output goes to a temporary mono WAV at the mixer rate, which is removed
//! when the transcode finishes whatever the outcome.

use moa_core::domain::audio::{AudioError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Program looked up on `PATH` when none is configured
pub const FFMPEG_PROGRAM: &str = "ffmpeg";

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: Option<PathBuf>,
    sample_rate: u32,
}

impl FfmpegTranscoder {
    /// Transcoder that resolves `ffmpeg` from `PATH` on each use
    pub fn new(sample_rate: u32) -> Self {
        Self {
            program: None,
            sample_rate,
        }
    }

    /// Use an explicit executable instead of searching `PATH`
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether the executable can be found
    pub fn is_available(&self) -> bool {
        self.program().is_ok()
    }

    fn program(&self) -> std::result::Result<PathBuf, String> {
        match &self.program {
            Some(program) if program.is_file() => Ok(program.clone()),
            Some(program) => which::which(program).map_err(|e| format!("{}: {e}", program.display())),
            None => which::which(FFMPEG_PROGRAM).map_err(|e| format!("{FFMPEG_PROGRAM} not found: {e}")),
        }
    }

    fn arguments(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-i".into(), input.into()];
        args.extend(
            ["-ac", "1", "-ar", &self.sample_rate.to_string(), "-f", "wav", "-y"]
                .into_iter()
                .map(OsString::from),
        );
        args.push(output.into());
        args
    }

    /// Transcode `input` to a temporary WAV and hand its path to `consume`
    ///
    /// The temporary file is deleted before this returns, on success and on
    /// failure alike.
    pub fn transcode_with<T, F>(&self, input: &Path, consume: F) -> Result<T>
    where
        F: FnOnce(&Path) -> Result<T>,
    {
        let name = input.display().to_string();
        let fail = |reason: String| AudioError::decode(name.clone(), reason);

        let program = self.program().map_err(&fail)?;
        let output = tempfile::Builder::new()
            .prefix("moa-transcode-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| fail(format!("cannot create temporary file: {e}")))?;

        self.run(&program, input, &output).map_err(&fail)?;
        info!(asset = %name, rate = self.sample_rate, "Transcoded with ffmpeg");
        consume(output.path())
    }

    fn run(&self, program: &Path, input: &Path, output: &NamedTempFile) -> std::result::Result<(), String> {
        let args = self.arguments(input, output.path());
        debug!(program = %program.display(), ?args, "Running transcoder");

        let result = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| format!("failed to run {}: {e}", program.display()))?;

        if result.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&result.stderr);
        let detail = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("no output");
        Err(format!("{} exited with {}: {detail}", program.display(), result.status))
    }
}
