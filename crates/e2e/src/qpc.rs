//! Runner for the `qpc` command-line client

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tokio::process::Command as TokioCommand;
use tracing::debug;

use crate::config::SourceConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::status::{JobRecord, JobRef};

/// A single `--name value` option, or a bare `--name` flag when the value
/// is `None`.
pub type CliOption<'a> = (&'a str, Option<&'a str>);

/// Output captured from one `qpc` invocation
#[derive(Debug, Clone)]
pub struct CliOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CliOutput {
    /// stdout followed by stderr, the way a terminal would show them
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Handle to the `qpc` binary
#[derive(Debug, Clone)]
pub struct QpcCli {
    binary: PathBuf,
}

impl Default for QpcCli {
    fn default() -> Self {
        Self::new("qpc")
    }
}

impl QpcCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run `qpc <subcommand...> <options...>` and check the exit code
    pub async fn run(
        &self,
        subcommand: &[&str],
        options: &[CliOption<'_>],
        expected_exit: i32,
    ) -> HarnessResult<CliOutput> {
        self.exec(build_args(subcommand, options), expected_exit).await
    }

    async fn exec(&self, args: Vec<OsString>, expected_exit: i32) -> HarnessResult<CliOutput> {
        let command = self.render(&args);
        debug!("Running: {}", command);

        let output = TokioCommand::new(&self.binary).args(&args).output().await?;
        let output = CliOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if output.code != Some(expected_exit) {
            return Err(HarnessError::CliFailed {
                command,
                code: output.code,
                output: output.combined(),
            });
        }
        Ok(output)
    }

    /// Point the client at a server
    pub async fn server_config(&self, host: &str, port: u16) -> HarnessResult<()> {
        let port = port.to_string();
        self.run(&["server", "config"], &[("host", Some(host)), ("port", Some(port.as_str()))], 0)
            .await?;
        Ok(())
    }

    pub async fn source_clear_all(&self) -> HarnessResult<()> {
        self.run(&["source", "clear"], &[("all", None)], 0).await?;
        Ok(())
    }

    /// Add a configured source. Credentials are referenced by name and
    /// must already exist on the server.
    pub async fn source_add(&self, source: &SourceConfig) -> HarnessResult<()> {
        self.exec(source_add_args(source), 0).await?;
        Ok(())
    }

    /// `qpc scan add`; the output must confirm the scan was added
    pub async fn scan_add(&self, name: &str, sources: &[&str]) -> HarnessResult<()> {
        let sources = sources.join(" ");
        let out = self
            .run(&["scan", "add"], &[("name", Some(name)), ("sources", Some(sources.as_str()))], 0)
            .await?
            .combined();

        let expected = format!("Scan \"{}\" was added.", name);
        if !out.trim_start().starts_with(&expected) {
            return Err(HarnessError::UnexpectedOutput(out));
        }
        Ok(())
    }

    /// `qpc scan start`, returning the id of the new scan job
    pub async fn scan_start(&self, name: &str) -> HarnessResult<JobRef> {
        let out = self.run(&["scan", "start"], &[("name", Some(name))], 0).await?.combined();
        parse_started_job(&out)
    }

    /// `qpc scan job`, decoded into a job record
    pub async fn scan_job(&self, job: &JobRef) -> HarnessResult<JobRecord> {
        let out = self.run(&["scan", "job"], &[("id", Some(job.as_str()))], 0).await?;
        let details: Value = serde_json::from_str(out.stdout.trim())?;
        Ok(JobRecord::from_value(details))
    }

    pub async fn scan_pause(&self, job: &JobRef, expected_exit: i32) -> HarnessResult<String> {
        self.job_action("pause", job, expected_exit).await
    }

    pub async fn scan_restart(&self, job: &JobRef, expected_exit: i32) -> HarnessResult<String> {
        self.job_action("restart", job, expected_exit).await
    }

    pub async fn scan_cancel(&self, job: &JobRef, expected_exit: i32) -> HarnessResult<String> {
        self.job_action("cancel", job, expected_exit).await
    }

    /// Write the JSON report to `output_file` and return it decoded
    pub async fn report_detail(&self, report_id: &str, output_file: &Path) -> HarnessResult<Value> {
        let path = output_file.to_string_lossy();
        self.run(
            &["report", "detail"],
            &[("json", None), ("output-file", Some(path.as_ref())), ("report", Some(report_id))],
            0,
        )
        .await?;
        let content = tokio::fs::read_to_string(output_file).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn job_action(&self, action: &str, job: &JobRef, expected_exit: i32) -> HarnessResult<String> {
        let out = self
            .run(&["scan", action], &[("id", Some(job.as_str()))], expected_exit)
            .await?;
        Ok(out.combined())
    }

    fn render(&self, args: &[OsString]) -> String {
        std::iter::once(self.binary.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Build the argument list. Option names get `--` and have underscores
/// turned into dashes; values containing spaces become separate arguments.
pub fn build_args(subcommand: &[&str], options: &[CliOption<'_>]) -> Vec<OsString> {
    let mut args: Vec<OsString> = subcommand.iter().map(OsString::from).collect();
    for (name, value) in options {
        args.push(format!("--{}", name.replace('_', "-")).into());
        if let Some(value) = value {
            args.extend(value.split_whitespace().map(OsString::from));
        }
    }
    args
}

/// Arguments for `qpc source add`. `credentials` is passed as `--cred` and
/// each extra option goes through as `--<name>` with dashes for underscores.
pub fn source_add_args(source: &SourceConfig) -> Vec<OsString> {
    let hosts = source.hosts.join(" ");
    let creds = source.credentials.join(" ");

    let mut options: Vec<CliOption<'_>> = vec![
        ("name", Some(source.name.as_str())),
        ("type", Some(source.source_type.as_str())),
        ("hosts", Some(hosts.as_str())),
        ("cred", Some(creds.as_str())),
    ];
    options.extend(source.options.iter().map(|(k, v)| (k.as_str(), Some(v.as_str()))));

    build_args(&["source", "add"], &options)
}

/// Extract the job id from `Scan "<id>" started.`
pub fn parse_started_job(output: &str) -> HarnessResult<JobRef> {
    static STARTED: OnceLock<Regex> = OnceLock::new();
    let re = STARTED.get_or_init(|| {
        Regex::new(r#"^\s*Scan "(\d+)" started\."#).expect("scan start pattern is valid")
    });

    re.captures(output)
        .and_then(|c| c.get(1))
        .map(|m| JobRef::new(m.as_str()))
        .ok_or_else(|| HarnessError::UnexpectedOutput(output.to_string()))
}
