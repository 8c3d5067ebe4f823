//! External process plumbing: mermaid-cli, svgexport and pandoc.
//!
//! Every invocation goes through [`run_tool`]: no shell, arguments passed as
//! a vector (paths with spaces need no quoting), output captured, and a hard
//! timeout. `kill_on_drop` makes sure a timed-out child does not linger,
//! which matters for mermaid-cli because it drives a headless browser.

use crate::error::Md2DocxError;
use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tool_locate::{ExternalTool, ToolCommand};
use tracing::{debug, warn};

/// Longest stderr excerpt kept in error messages.
const STDERR_LIMIT: usize = 2000;

/// Captured output of a successful tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// The configured command for `tool`, or whatever [`tool_locate::locate`] finds.
pub fn resolve_command(
    tool: ExternalTool,
    explicit: Option<&ToolCommand>,
) -> Result<ToolCommand, Md2DocxError> {
    if let Some(cmd) = explicit {
        return Ok(cmd.clone());
    }
    tool_locate::locate(tool).map_err(|e| Md2DocxError::ToolNotFound {
        tool,
        detail: e.to_string(),
    })
}

/// Run `command` followed by `args`, waiting at most `timeout`.
pub async fn run_tool(
    tool: ExternalTool,
    command: &ToolCommand,
    args: &[OsString],
    timeout: Duration,
) -> Result<ToolOutput, Md2DocxError> {
    debug!("Running {}: {} {:?}", tool, command, args);

    let mut cmd = tokio::process::Command::new(&command.program);
    cmd.args(&command.args)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| Md2DocxError::ToolNotFound {
        tool,
        detail: format!("could not start '{}': {}", command.program.display(), e),
    })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| Md2DocxError::ToolFailed {
            tool,
            status: None,
            stderr: e.to_string(),
        })?,
        Err(_) => {
            warn!("{} timed out after {}s", tool, timeout.as_secs());
            return Err(Md2DocxError::ToolTimeout {
                tool,
                secs: timeout.as_secs(),
            });
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(Md2DocxError::ToolFailed {
            tool,
            status: output.status.code(),
            stderr: summarise_stderr(&stderr, &stdout),
        });
    }

    Ok(ToolOutput { stdout, stderr })
}

/// Last [`STDERR_LIMIT`] bytes of stderr, or of stdout if stderr is empty.
fn summarise_stderr(stderr: &str, stdout: &str) -> String {
    let text = if stderr.trim().is_empty() { stdout } else { stderr };
    let text = text.trim();
    if text.len() <= STDERR_LIMIT {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_LIMIT;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("…{}", &text[start..])
}

fn ensure_output(tool: ExternalTool, path: &Path) -> Result<(), Md2DocxError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Md2DocxError::ToolFailed {
            tool,
            status: Some(0),
            stderr: format!("no output written to '{}'", path.display()),
        })
    }
}

// ── mermaid-cli ─────────────────────────────────────────────────────────────

/// Render Mermaid `body` to `png_path`.
///
/// The body goes through a temporary `.mmd` file because mmdc only reads
/// diagram sources from disk.
pub async fn render_mermaid(
    command: &ToolCommand,
    body: &str,
    png_path: &Path,
    background: &str,
    timeout: Duration,
) -> Result<(), Md2DocxError> {
    let mut input = tempfile::Builder::new()
        .prefix("md2docx-")
        .suffix(".mmd")
        .tempfile()
        .map_err(|e| Md2DocxError::Internal(format!("tempfile: {e}")))?;
    input
        .write_all(body.as_bytes())
        .and_then(|_| input.flush())
        .map_err(|e| Md2DocxError::Internal(format!("tempfile write: {e}")))?;

    let args: Vec<OsString> = vec![
        "-i".into(),
        input.path().as_os_str().to_owned(),
        "-o".into(),
        png_path.as_os_str().to_owned(),
        "-b".into(),
        background.into(),
    ];
    run_tool(ExternalTool::MermaidCli, command, &args, timeout).await?;
    ensure_output(ExternalTool::MermaidCli, png_path)
}

// ── svgexport ───────────────────────────────────────────────────────────────

/// Rasterise `svg_path` to `png_path` at `width_px` pixels wide.
pub async fn convert_svg(
    command: &ToolCommand,
    svg_path: &Path,
    png_path: &Path,
    width_px: u32,
    timeout: Duration,
) -> Result<(), Md2DocxError> {
    let args: Vec<OsString> = vec![
        svg_path.as_os_str().to_owned(),
        png_path.as_os_str().to_owned(),
        format!("{width_px}:").into(),
    ];
    run_tool(ExternalTool::SvgExport, command, &args, timeout).await?;
    ensure_output(ExternalTool::SvgExport, png_path)
}

// ── pandoc ──────────────────────────────────────────────────────────────────

/// Arguments for a Markdown → DOCX pandoc run.
pub fn pandoc_args(
    markdown: &Path,
    docx: &Path,
    resource_dir: &Path,
    reference_doc: Option<&Path>,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        markdown.as_os_str().to_owned(),
        "-o".into(),
        docx.as_os_str().to_owned(),
        "--from".into(),
        "markdown".into(),
        "--to".into(),
        "docx".into(),
    ];

    let mut resource = OsString::from("--resource-path=");
    resource.push(resource_dir.as_os_str());
    args.push(resource);

    if let Some(reference) = reference_doc {
        let mut arg = OsString::from("--reference-doc=");
        arg.push(reference.as_os_str());
        args.push(arg);
    }
    args
}

/// Convert `markdown` to `docx`, resolving images against `resource_dir`.
pub async fn run_pandoc(
    command: &ToolCommand,
    markdown: &Path,
    docx: &Path,
    resource_dir: &Path,
    reference_doc: Option<&Path>,
    timeout: Duration,
) -> Result<(), Md2DocxError> {
    let args = pandoc_args(markdown, docx, resource_dir, reference_doc);
    let out = run_tool(ExternalTool::Pandoc, command, &args, timeout).await?;
    if !out.stderr.trim().is_empty() {
        // Missing images and unknown extensions are reported as warnings.
        warn!("pandoc: {}", out.stderr.trim());
    }
    ensure_output(ExternalTool::Pandoc, docx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn pandoc_arguments() {
        let args = pandoc_args(
            Path::new("dir/_temp_word.md"),
            Path::new("out.docx"),
            Path::new("/abs/dir"),
            Some(Path::new("ref.docx")),
        );
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "dir/_temp_word.md",
                "-o",
                "out.docx",
                "--from",
                "markdown",
                "--to",
                "docx",
                "--resource-path=/abs/dir",
                "--reference-doc=ref.docx",
            ]
        );
    }

    #[test]
    fn stderr_summary_prefers_stderr_and_truncates() {
        assert_eq!(summarise_stderr("  boom \n", "ignored"), "boom");
        assert_eq!(summarise_stderr("", "from stdout"), "from stdout");

        let long = "é".repeat(STDERR_LIMIT);
        let summary = summarise_stderr(&long, "");
        assert!(summary.starts_with('…'));
        assert!(summary.len() <= STDERR_LIMIT + '…'.len_utf8());
    }

    #[test]
    fn explicit_command_wins() {
        let cmd = ToolCommand::new("/opt/pandoc");
        let resolved = resolve_command(ExternalTool::Pandoc, Some(&cmd)).unwrap();
        assert_eq!(resolved.program, PathBuf::from("/opt/pandoc"));
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let cmd = ToolCommand::new("/definitely/not/a/tool");
        let err = run_tool(ExternalTool::Pandoc, &cmd, &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Md2DocxError::ToolNotFound { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_tool_failed() {
        let cmd = ToolCommand::new("sh").with_arg("-c").with_arg("echo oops >&2; exit 3");
        let err = run_tool(ExternalTool::SvgExport, &cmd, &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            Md2DocxError::ToolFailed { status, stderr, .. } => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_run_captures_both_streams() {
        let cmd = ToolCommand::new("sh")
            .with_arg("-c")
            .with_arg("echo rendered; echo 'deprecated flag' >&2");
        let out = run_tool(ExternalTool::MermaidCli, &cmd, &[], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.stdout, "rendered\n");
        assert_eq!(out.stderr, "deprecated flag\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_tool_times_out() {
        let cmd = ToolCommand::new("sleep").with_arg("5");
        let err = run_tool(ExternalTool::MermaidCli, &cmd, &[], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Md2DocxError::ToolTimeout { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn success_without_output_file_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("never.png");
        let cmd = ToolCommand::new("true");
        let err = convert_svg(&cmd, Path::new("in.svg"), &png, 800, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no output"), "got {err}");
    }
}
