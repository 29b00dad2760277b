//! External tool invocation shared by the command-line collaborators.

use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;

use super::errors::{CollaboratorError, CollaboratorResult};
use crate::logging::RunLogger;

/// A single invocation of an external program.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    tool: String,
    program: String,
    args: Vec<String>,
    stdin: Option<Vec<u8>>,
}

impl ToolCommand {
    /// `tool` names the collaborator in errors and logs; `program` is run.
    pub fn new(tool: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Bytes written to the program's stdin.
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Command line as logged.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run and require a zero exit status.
    ///
    /// On failure the collected output tail is written to the run log.
    pub fn run(&self, log: &RunLogger) -> CollaboratorResult<Output> {
        let output = self.run_unchecked(log)?;

        if !output.status.success() {
            log.show_tail(&self.tool);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollaboratorError::command_failed(
                &self.tool,
                output.status.code().unwrap_or(-1),
                stderr.trim(),
            ));
        }

        Ok(output)
    }

    /// Run and return the output whatever the exit status.
    pub fn run_unchecked(&self, log: &RunLogger) -> CollaboratorResult<Output> {
        log.command(&self.command_line());
        tracing::debug!(tool = %self.tool, "Running: {}", self.command_line());

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd.spawn().map_err(|source| CollaboratorError::Spawn {
            tool: self.tool.clone(),
            source,
        })?;

        // Feed stdin from its own thread so stdout and stderr drain meanwhile.
        let writer = match (self.stdin.clone(), child.stdin.take()) {
            (Some(input), Some(mut pipe)) => Some(thread::spawn(move || {
                match pipe.write_all(&input) {
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                }
            })),
            _ => None,
        };

        let output = child
            .wait_with_output()
            .map_err(|e| CollaboratorError::io(&self.tool, "waiting for exit", e))?;

        if let Some(writer) = writer {
            writer
                .join()
                .map_err(|_| CollaboratorError::failed(&self.tool, "stdin writer panicked"))?
                .map_err(|e| CollaboratorError::io(&self.tool, "writing stdin", e))?;
        }

        log.output_block(
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        );

        Ok(output)
    }
}
