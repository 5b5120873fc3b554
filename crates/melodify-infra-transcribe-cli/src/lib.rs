use log::debug;
use melodify_ports::transcribe::{
    TranscribeError, TranscribeOptions, TranscribePort, TranscribeResult,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg", "m4a"];

/// Drives an external audio-to-MIDI transcriber as a batch subprocess:
/// `<engine> -i <audio> -o <workdir>`, then collects the .mid it wrote.
pub struct CliTranscriber {
    default_engine_path: Option<String>,
}

impl CliTranscriber {
    pub fn new(default_engine_path: Option<String>) -> Self {
        Self {
            default_engine_path,
        }
    }

    fn engine_path(&self, options: &TranscribeOptions) -> String {
        options
            .engine_path
            .clone()
            .or_else(|| self.default_engine_path.clone())
            .unwrap_or_else(|| "transkun".to_string())
    }

    fn make_workdir() -> Result<PathBuf, TranscribeError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TranscribeError::Backend(e.to_string()))?
            .as_millis();
        let pid = std::process::id();
        let dir = std::env::temp_dir()
            .join("melodify-transcribe")
            .join(format!("job-{}-{}", pid, now));
        fs::create_dir_all(&dir).map_err(|e| TranscribeError::Backend(e.to_string()))?;
        Ok(dir)
    }

    fn find_output_midi(output_dir: &Path, stem: &str) -> Option<PathBuf> {
        let named = output_dir.join(format!("{}.mid", stem));
        if named.exists() {
            return Some(named);
        }
        let entries = fs::read_dir(output_dir).ok()?;
        for entry in entries.flatten() {
            let path = entry.path();
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if ext.eq_ignore_ascii_case("mid") || ext.eq_ignore_ascii_case("midi") {
                    return Some(path);
                }
            }
        }
        None
    }
}

fn check_audio_extension(path: &Path) -> Result<&str, TranscribeError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| TranscribeError::UnsupportedFormat("invalid audio filename".to_string()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        return Err(TranscribeError::UnsupportedFormat(ext));
    }
    Ok(stem)
}

impl TranscribePort for CliTranscriber {
    fn transcribe(
        &self,
        audio_path: &str,
        options: TranscribeOptions,
    ) -> Result<TranscribeResult, TranscribeError> {
        let engine = self.engine_path(&options);
        let input_path = Path::new(audio_path);
        let stem = check_audio_extension(input_path)?;

        let output_dir = Self::make_workdir()?;
        debug!("transcribing {audio_path} via {engine} into {}", output_dir.display());

        let output = Command::new(engine)
            .arg("-i")
            .arg(input_path)
            .arg("-o")
            .arg(&output_dir)
            .output()
            .map_err(|e| TranscribeError::Backend(e.to_string()))?;

        let diagnostics_path = if options.keep_diagnostics {
            let diag_path = output_dir.join("transcribe.log");
            let mut content = Vec::new();
            content.extend_from_slice(&output.stdout);
            content.extend_from_slice(&output.stderr);
            let _ = fs::write(&diag_path, content);
            Some(diag_path)
        } else {
            None
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(TranscribeError::TranscriptionFailed(stderr));
        }

        let midi_path = Self::find_output_midi(&output_dir, stem).ok_or_else(|| {
            TranscribeError::TranscriptionFailed("no midi produced".to_string())
        })?;
        let midi_bytes =
            fs::read(&midi_path).map_err(|e| TranscribeError::Backend(e.to_string()))?;

        Ok(TranscribeResult {
            midi_bytes,
            diagnostics_path,
        })
    }
}
