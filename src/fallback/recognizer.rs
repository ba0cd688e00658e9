use crate::error::Failure;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::process::Command;
use tracing::debug;

/// Speech-to-text over an isolated vocal stem (16-bit PCM WAV).
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn recognize(&self, wav: &[u8]) -> Result<String, Failure>;
}

/// Stand-in used when no recognizer is configured.
#[derive(Debug, Default)]
pub struct UnsupportedRecognizer;

#[async_trait]
impl SpeechRecognizer for UnsupportedRecognizer {
    async fn recognize(&self, _wav: &[u8]) -> Result<String, Failure> {
        Err(Failure::Unsupported(
            "no speech recognizer configured".into(),
        ))
    }
}

/// Placeholder in argv replaced by the WAV file path.
pub const INPUT_PLACEHOLDER: &str = "{input}";

static NEXT_INPUT: AtomicU64 = AtomicU64::new(0);

/// Temp file removed when dropped, including when the recognition future is
/// cancelled mid-run.
struct StemFile(PathBuf);

impl StemFile {
    fn next() -> Self {
        let n = NEXT_INPUT.fetch_add(1, Ordering::Relaxed);
        Self(std::env::temp_dir().join(format!("verse-stem-{}-{n}.wav", std::process::id())))
    }
}

impl Drop for StemFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("Could not remove {}: {e}", self.0.display());
            }
        }
    }
}

/// Runs an external command per request. The stem is written to a temp file
/// and the transcript read from stdout.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    argv: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(argv: Vec<String>) -> anyhow::Result<Self> {
        if argv.first().is_none_or(|p| p.trim().is_empty()) {
            anyhow::bail!("recognizer_command must name a program");
        }
        Ok(Self { argv })
    }

    async fn run(&self, input: &Path) -> Result<String, Failure> {
        let input = input.to_string_lossy();
        let args = self.argv[1..]
            .iter()
            .map(|a| a.replace(INPUT_PLACEHOLDER, &input));

        let out = Command::new(&self.argv[0])
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Failure::transport(format!("run {}: {e}", self.argv[0])))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(Failure::Transport(format!(
                "{} exited with {}: {}",
                self.argv[0],
                out.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&out.stdout).trim().to_string();
        if text.is_empty() {
            return Err(Failure::NotFound);
        }
        Ok(text)
    }
}

#[async_trait]
impl SpeechRecognizer for CommandRecognizer {
    async fn recognize(&self, wav: &[u8]) -> Result<String, Failure> {
        let stem = StemFile::next();
        tokio::fs::write(&stem.0, wav)
            .await
            .map_err(|e| Failure::transport(format!("write {}: {e}", stem.0.display())))?;
        debug!("Recognizer input at {}", stem.0.display());

        self.run(&stem.0).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sh(script: &str) -> CommandRecognizer {
        CommandRecognizer::new(vec!["sh".into(), "-c".into(), script.into(), "sh".into(), "{input}".into()])
            .unwrap()
    }

    #[test]
    fn test_empty_command_is_rejected() {
        assert!(CommandRecognizer::new(vec![]).is_err());
        assert!(CommandRecognizer::new(vec![" ".into()]).is_err());
    }

    #[tokio::test]
    async fn test_unsupported_recognizer() {
        let r = UnsupportedRecognizer.recognize(b"RIFF").await;
        assert!(matches!(r, Err(Failure::Unsupported(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_reads_input_file() {
        // prints the byte count of the stem file
        let r = sh(r#"printf '  %s bytes  \n' "$(wc -c < "$1" | tr -d ' ')""#);
        assert_eq!(r.recognize(&[0u8; 12]).await.unwrap(), "12 bytes");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_failures() {
        assert_eq!(sh("printf '   '").recognize(b"x").await, Err(Failure::NotFound));
        assert!(matches!(
            sh("echo nope >&2; exit 3").recognize(b"x").await,
            Err(Failure::Transport(msg)) if msg.contains("nope")
        ));

        let missing = CommandRecognizer::new(vec!["verse-no-such-recognizer".into()]).unwrap();
        assert!(matches!(missing.recognize(b"x").await, Err(Failure::Transport(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancelled_recognition_removes_stem() {
        let marker = std::env::temp_dir().join(format!("verse-stem-marker-{}", std::process::id()));
        let _ = std::fs::remove_file(&marker);
        let script = format!(r#"echo "$1" > '{}'; sleep 5"#, marker.display());

        let out = tokio::time::timeout(Duration::from_secs(1), sh(&script).recognize(b"RIFF")).await;
        assert!(out.is_err());

        let stem = std::fs::read_to_string(&marker).unwrap();
        let _ = std::fs::remove_file(&marker);
        let stem = PathBuf::from(stem.trim());
        assert!(stem.starts_with(std::env::temp_dir()));
        assert!(!stem.exists(), "{} left behind", stem.display());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_finished_recognition_removes_stem() {
        let r = sh(r#"echo "$1""#);
        let stem = PathBuf::from(r.recognize(b"RIFF").await.unwrap());
        assert!(!stem.exists());
    }
}
