//! Syntax validator collaborator.
//!
//! Validation is keyed on content only. The stager decides what a failure
//! means based on where the process is in its boot sequence.

use std::io::{ErrorKind, Read, Write};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use hotswap_core::ValidatorConfig;
use thiserror::Error;

/// Validator answer for one source blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    /// Diagnostic text from the parser.
    Invalid(String),
}

/// The validator could not produce a verdict at all.
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("failed to spawn validator '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("validator '{program}' I/O failure: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("validator '{program}' gave no verdict within {}ms", timeout.as_millis())]
    Timeout { program: String, timeout: Duration },
}

pub trait SyntaxValidator: Send {
    fn validate(&self, source: &[u8]) -> Result<Verdict, ValidatorError>;
}

impl<F> SyntaxValidator for F
where
    F: Fn(&[u8]) -> Verdict + Send,
{
    fn validate(&self, source: &[u8]) -> Result<Verdict, ValidatorError> {
        Ok(self(source))
    }
}

/// Treats every blob as valid. Used when no validator is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl SyntaxValidator for AcceptAll {
    fn validate(&self, _source: &[u8]) -> Result<Verdict, ValidatorError> {
        Ok(Verdict::Valid)
    }
}

/// Checker runs longer than this are killed.
pub const DEFAULT_VALIDATOR_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs an external checker with the source on stdin.
///
/// Exit status 0 is valid; otherwise stderr (or stdout when stderr is empty)
/// is the diagnostic. A checker still running after the timeout is killed
/// and reported as [`ValidatorError::Timeout`].
#[derive(Debug, Clone)]
pub struct CommandValidator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandValidator {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_VALIDATOR_TIMEOUT,
        }
    }

    pub fn from_config(config: &ValidatorConfig) -> Self {
        Self::new(config.command.clone(), config.args.iter().cloned())
            .with_timeout(Duration::from_millis(config.timeout_ms))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn io_error(&self, source: std::io::Error) -> ValidatorError {
        ValidatorError::Io {
            program: self.program.clone(),
            source,
        }
    }
}

impl SyntaxValidator for CommandValidator {
    fn validate(&self, source: &[u8]) -> Result<Verdict, ValidatorError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ValidatorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Pipes are serviced on their own threads so a checker that never
        // reads stdin or floods stdout cannot block the deadline below.
        let stdin = child.stdin.take();
        let payload = source.to_vec();
        let writer = thread::spawn(move || -> std::io::Result<()> {
            let Some(mut stdin) = stdin else { return Ok(()) };
            match stdin.write_all(&payload) {
                // A checker may exit before reading everything.
                Err(err) if err.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        });
        let stdout = collect(child.stdout.take());
        let stderr = collect(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait().map_err(|e| self.io_error(e))? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!(
                        program = %self.program,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "validator timed out, killed",
                    );
                    return Err(ValidatorError::Timeout {
                        program: self.program.clone(),
                        timeout: self.timeout,
                    });
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        if let Ok(Err(err)) = writer.join() {
            return Err(self.io_error(err));
        }
        if status.success() {
            return Ok(Verdict::Valid);
        }

        let stderr = String::from_utf8_lossy(&stderr.join().unwrap_or_default()).trim().to_string();
        let stdout = String::from_utf8_lossy(&stdout.join().unwrap_or_default()).trim().to_string();
        let diagnostic = if !stderr.is_empty() {
            stderr
        } else if !stdout.is_empty() {
            stdout
        } else {
            format!("{} exited with {}", self.program, status)
        };
        Ok(Verdict::Invalid(diagnostic))
    }
}

fn collect<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_validators() {
        let validator = |src: &[u8]| {
            if src.starts_with(b"def") {
                Verdict::Valid
            } else {
                Verdict::Invalid("unexpected token".to_string())
            }
        };
        assert_eq!(validator.validate(b"def tick; end").unwrap(), Verdict::Valid);
        assert!(matches!(validator.validate(b"end").unwrap(), Verdict::Invalid(_)));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let validator = CommandValidator::new("hotswap-no-such-validator", Vec::<String>::new());
        let err = validator.validate(b"puts 1").unwrap_err();
        assert!(matches!(err, ValidatorError::Spawn { .. }), "got: {err}");
    }

    #[cfg(unix)]
    #[test]
    fn command_exit_status_decides_verdict() {
        let script = "if grep -q BROKEN; then echo 'syntax error, unexpected end-of-input' >&2; exit 1; fi";
        let validator = CommandValidator::new("sh", ["-c", script]);

        assert_eq!(validator.validate(b"puts 1\n").unwrap(), Verdict::Valid);
        assert_eq!(
            validator.validate(b"BROKEN\n").unwrap(),
            Verdict::Invalid("syntax error, unexpected end-of-input".to_string())
        );
    }

    #[cfg(unix)]
    #[test]
    fn hung_checker_is_killed_at_the_deadline() {
        let validator =
            CommandValidator::new("sleep", ["30"]).with_timeout(Duration::from_millis(200));

        let started = Instant::now();
        let err = validator.validate(b"def tick(args); end\n").unwrap_err();
        assert!(matches!(err, ValidatorError::Timeout { .. }), "got: {err}");
        assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
    }

    #[test]
    fn config_timeout_is_applied() {
        let validator = CommandValidator::from_config(&ValidatorConfig {
            command: "ruby".to_string(),
            args: vec!["-c".to_string()],
            timeout_ms: 250,
        });
        assert_eq!(validator.timeout, Duration::from_millis(250));
    }
}
