use crate::protocol::{parse_output, AnswerKeyVersion, EvaluationOutput, RawOutput};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const SLOW_CALL_WARN_THRESHOLD: Duration = Duration::from_secs(30);

/// 评分程序启动选项（由上层配置传入）
#[derive(Debug, Clone)]
pub struct EvaluatorOptions {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub work_dir: Option<PathBuf>,
    /// 为 None 时不设超时，一直等待评分程序退出
    pub timeout: Option<Duration>,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            program: PathBuf::from("python3"),
            args: vec!["-m".to_string(), "theme_1_omr_system".to_string()],
            work_dir: None,
            timeout: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EvaluatorError {
    #[error("failed to start evaluator `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("evaluator I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("evaluator timed out after {0:?}")]
    Timeout(Duration),
    /// 评分程序自身报告的错误，原样保留其描述
    #[error("{0}")]
    Failed(String),
    #[error("malformed evaluator output: {0}")]
    Malformed(String),
}

/// 以子进程方式调用外部评分程序
///
/// 调用约定：`<program> <args...> <image_path> --version <A|B> [--debug]`，
/// 成功时 stdout 输出一个 JSON 文档。
#[derive(Debug, Clone)]
pub struct ProcessEvaluator {
    options: EvaluatorOptions,
}

impl ProcessEvaluator {
    pub fn new(options: EvaluatorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EvaluatorOptions {
        &self.options
    }

    /// 阻塞调用评分程序，直到其退出（或超时被终止）
    pub fn evaluate(
        &self,
        image_path: &Path,
        version: AnswerKeyVersion,
        debug_overlay: bool,
    ) -> Result<EvaluationOutput, EvaluatorError> {
        let started = Instant::now();
        let mut command = self.build_command(image_path, version, debug_overlay);
        debug!(
            event = "evaluator.spawn",
            program = %self.options.program.display(),
            image = %image_path.display(),
            version = %version,
            overlay = debug_overlay
        );

        let mut child = command.spawn().map_err(|source| EvaluatorError::Spawn {
            program: self.options.program.display().to_string(),
            source,
        })?;

        let stdout_reader = spawn_pipe_reader(child.stdout.take());
        let stderr_reader = spawn_pipe_reader(child.stderr.take());

        // 超时后不再等待读管道线程：残留的孙进程可能仍持有管道
        let Some(status) = self.wait_for_exit(&mut child)? else {
            let timeout = self.options.timeout.unwrap_or_default();
            warn!(event = "evaluator.timeout", timeout_ms = timeout.as_millis() as u64);
            return Err(EvaluatorError::Timeout(timeout));
        };
        let stdout = join_pipe_reader(stdout_reader);
        let stderr = join_pipe_reader(stderr_reader);

        let elapsed = started.elapsed();
        if elapsed > SLOW_CALL_WARN_THRESHOLD {
            warn!(event = "evaluator.slow", elapsed_ms = elapsed.as_millis() as u64);
        }

        if !status.success() {
            let message = last_meaningful_line(&stderr)
                .map(str::to_string)
                .unwrap_or_else(|| format!("evaluator exited with {}", status));
            info!(event = "evaluator.exit_failure", status = %status, message = %message);
            return Err(EvaluatorError::Failed(message));
        }

        match parse_output(&stdout).map_err(EvaluatorError::Malformed)? {
            RawOutput::Success(output) => {
                debug!(
                    event = "evaluator.complete",
                    elapsed_ms = elapsed.as_millis() as u64,
                    questions = output.result.per_question.len()
                );
                Ok(self.resolve_artifact_paths(output))
            }
            RawOutput::Failure(message) => Err(EvaluatorError::Failed(message)),
        }
    }

    /// 评分程序返回的相对路径以其工作目录为基准
    fn resolve_artifact_paths(&self, mut output: EvaluationOutput) -> EvaluationOutput {
        let Some(work_dir) = &self.options.work_dir else {
            return output;
        };
        let resolve = |path: PathBuf| {
            if path.is_relative() {
                work_dir.join(path)
            } else {
                path
            }
        };
        output.json_path = resolve(output.json_path);
        output.csv_path = resolve(output.csv_path);
        output.debug_path = output.debug_path.map(resolve);
        output
    }

    fn build_command(
        &self,
        image_path: &Path,
        version: AnswerKeyVersion,
        debug_overlay: bool,
    ) -> Command {
        let mut command = Command::new(&self.options.program);
        command
            .args(&self.options.args)
            .arg(image_path)
            .arg("--version")
            .arg(version.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if debug_overlay {
            command.arg("--debug");
        }
        if let Some(dir) = &self.options.work_dir {
            command.current_dir(dir);
        }
        // 独立进程组，超时时连同其派生的子进程一起终止
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command
    }

    /// 返回 None 表示超时，子进程已被终止
    fn wait_for_exit(&self, child: &mut Child) -> io::Result<Option<ExitStatus>> {
        let Some(timeout) = self.options.timeout else {
            return child.wait().map(Some);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                kill_process_group(child);
                child.wait()?;
                return Ok(None);
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        }
    }
}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    // 子进程以自身 pid 作为进程组 id
    let group = format!("-{}", child.id());
    match Command::new("kill")
        .args(["-KILL", "--", &group])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => {}
        Ok(status) => {
            warn!(event = "evaluator.kill_group_failed", status = %status);
            kill_child(child);
        }
        Err(e) => {
            warn!(event = "evaluator.kill_group_failed", error = %e);
            kill_child(child);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    kill_child(child);
}

fn kill_child(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!(event = "evaluator.kill_failed", error = %e);
    }
}

fn spawn_pipe_reader<R>(pipe: Option<R>) -> Option<JoinHandle<String>>
where
    R: Read + Send + 'static,
{
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_pipe_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// 错误输出的最后一个非空行（回溯信息的最后一行通常就是异常描述）
fn last_meaningful_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|line| !line.is_empty())
}
