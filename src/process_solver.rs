//! Solver running an external executable.
//!
//! A child process is launched for every problem. It receives the problem json on its
//! stdin and must print its answer on stdout, either as a solution json
//! (`{"paths": [{"route": [{"x": 1, "y": 1}, ..]}, ..]}`) or as a raw list of routes
//! (`[[[1, 1], [2, 1]], ..]`), then exit with status 0.
//!
//! Unlike closures, a process can be stopped: when the deadline passes the child is
//! killed, so a hanging algorithm does not keep a CPU busy.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, bail, ensure, Context};
use serde::Deserialize;
use tracing::{instrument, trace, warn};
use wait_timeout::ChildExt;

use crate::problem::Problem;
use crate::solution::Solution;
use crate::solver::Solver;

/// Runs an executable per problem.
#[derive(Debug, Clone)]
pub struct ProcessSolver {
    program: PathBuf,
    args: Vec<String>,
    allow_stderr: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Answer {
    // a derived struct also accepts sequences: `[[]]` must stay one empty route
    Routes(Vec<Vec<(u32, u32)>>),
    Solution(Solution),
}

impl ProcessSolver {
    /// Run `program` without arguments, its stderr discarded.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ProcessSolver {
            program: program.into(),
            args: Vec::new(),
            allow_stderr: false,
        }
    }

    /// Arguments given to every launch.
    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Forward the child stderr to ours (debug purposes only).
    pub fn with_stderr(mut self, value: bool) -> Self {
        self.allow_stderr = value;
        self
    }

    fn launch(&self) -> anyhow::Result<SolverProcess> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped());
        if !self.allow_stderr {
            cmd.stderr(Stdio::null());
        }
        let child = cmd
            .spawn()
            .with_context(|| format!("command '{}' not found", self.program.display()))?;
        Ok(SolverProcess {
            child,
            reaped: false,
        })
    }

    #[instrument(skip_all, fields(program = %self.program.display(), problem = ?problem.id))]
    fn exchange(
        &self,
        problem: &Problem,
        deadline: Option<Instant>,
    ) -> anyhow::Result<Option<Solution>> {
        let input = problem.to_json()?;
        let mut process = self.launch()?;
        let mut stdin = process.child.stdin.take().context("child has no stdin")?;
        let mut stdout = process.child.stdout.take().context("child has no stdout")?;

        // both ends run on their own thread so a child that does not read its input
        // cannot block us past the deadline
        thread::Builder::new()
            .name("mapf-solver-stdin".to_string())
            .spawn(move || {
                // the child may exit (or be killed) without reading everything
                let _ = stdin.write_all(input.as_bytes());
            })
            .context("could not spawn stdin writer")?;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("mapf-solver-stdout".to_string())
            .spawn(move || {
                let mut output = String::new();
                let result = stdout.read_to_string(&mut output).map(|_| output);
                let _ = tx.send(result);
            })
            .context("could not spawn stdout reader")?;

        let output = match deadline {
            None => rx.recv().map_err(|_| anyhow!("stdout reader stopped"))?,
            Some(deadline) => {
                match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(output) => output,
                    Err(RecvTimeoutError::Timeout) => {
                        warn!("deadline reached, killing solver");
                        process.kill()?;
                        return Ok(None);
                    }
                    Err(RecvTimeoutError::Disconnected) => bail!("stdout reader stopped"),
                }
            }
        };
        let output = output.context("could not read solver output")?;

        let Some(status) = process.wait_until(deadline)? else {
            warn!("solver closed its output but did not exit before the deadline");
            process.kill()?;
            return Ok(None);
        };
        ensure!(status.success(), "solver exited with {status}");
        trace!(bytes = output.len(), "solver answered");

        let answer: Answer = serde_json::from_str(output.trim())
            .with_context(|| format!("invalid solver output: '{}'", truncate(&output, 200)))?;
        Ok(Some(match answer {
            Answer::Solution(solution) => solution,
            Answer::Routes(routes) => routes.into(),
        }))
    }
}

impl Solver for ProcessSolver {
    type Output = Solution;

    fn solve(&self, problem: &Problem) -> anyhow::Result<Solution> {
        self.exchange(problem, None)?
            .context("solver process gave no answer")
    }

    fn supports_hard_deadline(&self) -> bool {
        true
    }

    fn solve_before(
        &self,
        problem: &Problem,
        deadline: Instant,
    ) -> anyhow::Result<Option<Solution>> {
        self.exchange(problem, Some(deadline))
    }
}

/// Child process killed on drop unless it was waited for.
struct SolverProcess {
    child: Child,
    reaped: bool,
}

impl SolverProcess {
    /// Wait for the child to exit, at most until `deadline`. `None` if it did not.
    fn wait_until(&mut self, deadline: Option<Instant>) -> anyhow::Result<Option<ExitStatus>> {
        let status = match deadline {
            None => Some(self.child.wait().context("could not wait for solver")?),
            Some(deadline) => self
                .child
                .wait_timeout(deadline.saturating_duration_since(Instant::now()))
                .context("could not wait for solver")?,
        };
        self.reaped = status.is_some();
        Ok(status)
    }

    fn kill(&mut self) -> anyhow::Result<()> {
        trace!(pid = self.child.id(), "killing solver");
        // fails if the child already exited, reaping it is enough then
        let _ = self.child.kill();
        self.child.wait().context("could not reap solver process")?;
        self.reaped = true;
        Ok(())
    }
}

impl Drop for SolverProcess {
    fn drop(&mut self) {
        if !self.reaped {
            if let Err(e) = self.kill() {
                warn!("could not clean up solver process: {e:#}");
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
