use std::{
    ffi::OsString,
    io::Write as _,
    path::PathBuf,
    process::{Child, Command, Stdio},
};

use anyhow::Context as _;
use gbneat_training::{fitness::FitnessResult, genome::GenomeKey};
use serde::Serialize;

/// Runs one child process per job and collects their results.
///
/// Each child receives its job as JSON on stdin and answers with a single
/// [`FitnessResult`] line on stdout. A child that cannot be spawned, exits
/// unsuccessfully, or prints something unparsable contributes no result.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerPool {
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Re-invokes the running executable with the hidden `worker` subcommand.
    pub fn current_exe() -> anyhow::Result<Self> {
        let program = std::env::current_exe().context("Failed to locate the current executable")?;
        Ok(Self::new(program, ["worker"]))
    }

    /// Spawns every job, waits for all children, then parses their output.
    pub fn run<I, T>(&self, jobs: I) -> Vec<FitnessResult>
    where
        I: IntoIterator<Item = (GenomeKey, T)>,
        T: Serialize,
    {
        let children = jobs
            .into_iter()
            .filter_map(|(key, job)| match self.spawn(&job) {
                Ok(child) => Some((key, child)),
                Err(e) => {
                    tracing::warn!(key, error = %format!("{e:#}"), "worker failed to start");
                    None
                }
            })
            .collect::<Vec<_>>();

        let outputs = children
            .into_iter()
            .filter_map(|(key, child)| match child.wait_with_output() {
                Ok(output) => Some((key, output)),
                Err(e) => {
                    tracing::warn!(key, error = %e, "failed to wait for worker");
                    None
                }
            })
            .collect::<Vec<_>>();

        outputs
            .into_iter()
            .filter_map(|(key, output)| {
                if !output.status.success() {
                    tracing::warn!(key, status = %output.status, "worker failed");
                    return None;
                }
                match parse_result(&output.stdout) {
                    Ok(result) => Some(result),
                    Err(e) => {
                        tracing::warn!(key, error = %format!("{e:#}"), "unusable worker output");
                        None
                    }
                }
            })
            .collect()
    }

    fn spawn<T>(&self, job: &T) -> anyhow::Result<Child>
    where
        T: Serialize,
    {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.program.display()))?;

        let written = child
            .stdin
            .take()
            .context("worker stdin is not piped")
            .and_then(|mut stdin| {
                serde_json::to_writer(&mut stdin, job).context("Failed to encode job")?;
                stdin.flush().context("Failed to send job")?;
                Ok(())
            });
        if let Err(e) = written {
            // reap the child so it does not linger as a zombie
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }
        Ok(child)
    }
}

fn parse_result(stdout: &[u8]) -> anyhow::Result<FitnessResult> {
    let text = std::str::from_utf8(stdout).context("output is not UTF-8")?;
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .context("no result line")?;
    serde_json::from_str(line).with_context(|| format!("malformed result line: {line}"))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct TestJob {
        key: GenomeKey,
    }

    /// Echoes `{"key":K,"fitness":K.5}` for the key found in the job.
    const ECHO: &str = r#"job=$(cat); key=$(printf '%s' "$job" | sed 's/.*"key":\([0-9]*\).*/\1/'); printf '{"key":%s,"fitness":%s.5}\n' "$key" "$key""#;

    fn pool(script: &str) -> WorkerPool {
        WorkerPool::new("sh", ["-c", script])
    }

    fn jobs(keys: &[GenomeKey]) -> Vec<(GenomeKey, TestJob)> {
        keys.iter().map(|&key| (key, TestJob { key })).collect()
    }

    fn sorted(mut results: Vec<FitnessResult>) -> Vec<FitnessResult> {
        results.sort_by_key(|r| r.key);
        results
    }

    #[test]
    fn test_every_worker_reports_its_key() {
        let results = sorted(pool(ECHO).run(jobs(&[1, 2, 3])));
        assert_eq!(
            results,
            vec![
                FitnessResult { key: 1, fitness: 1.5 },
                FitnessResult { key: 2, fitness: 2.5 },
                FitnessResult { key: 3, fitness: 3.5 },
            ]
        );
    }

    #[test]
    fn test_killed_worker_yields_no_result() {
        let script = r#"case "$(cat)" in *'"key":2'*) kill -9 $$ ;; esac; printf '{"key":1,"fitness":4.0}\n'"#;
        let results = pool(script).run(jobs(&[1, 2]));
        assert_eq!(results, vec![FitnessResult { key: 1, fitness: 4.0 }]);
    }

    #[test]
    fn test_failing_and_garbled_workers_are_skipped() {
        assert!(pool("cat > /dev/null; exit 3").run(jobs(&[1])).is_empty());
        assert!(pool("cat > /dev/null; echo nonsense").run(jobs(&[1])).is_empty());
        assert!(pool("cat > /dev/null").run(jobs(&[1])).is_empty());
    }

    #[test]
    fn test_unspawnable_program() {
        let pool = WorkerPool::new("/nonexistent/gbneat-worker", ["worker"]);
        assert!(pool.run(jobs(&[1])).is_empty());
    }

    #[test]
    fn test_parse_result_skips_blank_lines() {
        let result = parse_result(b"\n  {\"key\":9,\"fitness\":-1.0}\n").unwrap();
        assert_eq!(result, FitnessResult { key: 9, fitness: -1.0 });
    }
}
