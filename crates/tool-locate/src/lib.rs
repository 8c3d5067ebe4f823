//! # tool-locate
//!
//! Find the external programs a Markdown → Word conversion shells out to,
//! so that callers do not have to hard-code `npx mmdc` or guess whether
//! pandoc lives on `PATH`.
//!
//! ## How it works
//!
//! [`locate`] resolves an [`ExternalTool`] to a runnable [`ToolCommand`]:
//!
//! 1. An environment override (`MD2DOCX_PANDOC`, `MD2DOCX_MMDC`,
//!    `MD2DOCX_SVGEXPORT`) parsed as a command line, e.g. `npx -y mmdc`.
//! 2. The tool's binary on `PATH`, plus the usual npm global bin
//!    directories that are often missing from `PATH` in CI shells.
//! 3. For npm-distributed tools, `npx <binary>` when `npx` itself is found.
//!
//! Successful resolutions are memoised for the lifetime of the process.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tool_locate::{locate, ExternalTool};
//!
//! let pandoc = locate(ExternalTool::Pandoc).expect("pandoc is required");
//! println!("using {}", pandoc);
//! ```
//!
//! ## Platform notes
//!
//! | OS      | Executable check                          |
//! |---------|-------------------------------------------|
//! | Unix    | regular file with any execute bit set     |
//! | Windows | regular file, names tried with `PATHEXT`  |

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use thiserror::Error;

// ── Tools ────────────────────────────────────────────────────────────────────

/// One of the three programs the conversion pipeline depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalTool {
    /// Markdown → DOCX structural conversion.
    Pandoc,
    /// Mermaid diagram renderer (`mmdc` from `@mermaid-js/mermaid-cli`).
    MermaidCli,
    /// SVG → PNG rasteriser.
    SvgExport,
}

impl ExternalTool {
    /// Every tool, in pipeline order.
    pub const ALL: [ExternalTool; 3] = [
        ExternalTool::MermaidCli,
        ExternalTool::SvgExport,
        ExternalTool::Pandoc,
    ];

    /// Executable name looked up on `PATH`.
    pub fn binary_name(self) -> &'static str {
        match self {
            ExternalTool::Pandoc => "pandoc",
            ExternalTool::MermaidCli => "mmdc",
            ExternalTool::SvgExport => "svgexport",
        }
    }

    /// Environment variable that overrides discovery.
    pub fn env_var(self) -> &'static str {
        match self {
            ExternalTool::Pandoc => "MD2DOCX_PANDOC",
            ExternalTool::MermaidCli => "MD2DOCX_MMDC",
            ExternalTool::SvgExport => "MD2DOCX_SVGEXPORT",
        }
    }

    /// npm package providing the binary, if the tool is distributed via npm.
    pub fn npm_package(self) -> Option<&'static str> {
        match self {
            ExternalTool::Pandoc => None,
            ExternalTool::MermaidCli => Some("@mermaid-js/mermaid-cli"),
            ExternalTool::SvgExport => Some("svgexport"),
        }
    }

    /// One-line installation hint shown when the tool cannot be found.
    pub fn install_hint(self) -> &'static str {
        match self {
            ExternalTool::Pandoc => {
                "Install pandoc (https://pandoc.org/installing.html), e.g. `winget install pandoc` or `brew install pandoc`"
            }
            ExternalTool::MermaidCli => "Install mermaid-cli: `npm install -g @mermaid-js/mermaid-cli`",
            ExternalTool::SvgExport => "Install svgexport: `npm install -g svgexport`",
        }
    }
}

impl fmt::Display for ExternalTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExternalTool::Pandoc => "pandoc",
            ExternalTool::MermaidCli => "mermaid-cli",
            ExternalTool::SvgExport => "svgexport",
        };
        f.write_str(name)
    }
}

// ── Commands ─────────────────────────────────────────────────────────────────

/// A program plus the fixed leading arguments needed to invoke a tool.
///
/// `npx mmdc` is `program = "npx"`, `args = ["mmdc"]`; call-specific
/// arguments are appended by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Parse a command line such as `npx -y mmdc` or
    /// `"C:\Program Files\Pandoc\pandoc.exe"`.
    ///
    /// Double quotes group words containing spaces. Returns `None` for a
    /// blank line or an unterminated quote.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = split_command_line(line)?.into_iter();
        let program = words.next()?;
        Some(Self {
            program: PathBuf::from(program),
            args: words.collect(),
        })
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

fn split_command_line(line: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_word = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_word = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_word {
                    words.push(std::mem::take(&mut current));
                    has_word = false;
                }
            }
            c => {
                current.push(c);
                has_word = true;
            }
        }
    }

    if in_quotes {
        return None;
    }
    if has_word {
        words.push(current);
    }
    if words.is_empty() {
        None
    } else {
        Some(words)
    }
}

/// How a tool was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Taken verbatim from the tool's environment variable.
    EnvOverride,
    /// Binary found in a search directory.
    SearchPath,
    /// Run through `npx`, which fetches the package on demand.
    Npx,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resolution::EnvOverride => "environment override",
            Resolution::SearchPath => "PATH",
            Resolution::Npx => "npx",
        })
    }
}

/// A resolved tool together with how it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedTool {
    pub command: ToolCommand,
    pub resolution: Resolution,
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by tool-locate operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    /// Nothing on `PATH`, in npm bin dirs, or via npx.
    #[error("{tool} not found.\n{hint}\nOr point {env_var} at the executable.")]
    NotFound {
        tool: ExternalTool,
        env_var: &'static str,
        hint: &'static str,
    },

    /// The override variable is set but cannot be parsed as a command.
    #[error("{var} is set but is not a usable command line: {value:?}")]
    InvalidOverride { var: &'static str, value: String },
}

// ── Search directories ───────────────────────────────────────────────────────

/// Directories where `npm install -g` puts executables for common setups.
///
/// - `$NPM_CONFIG_PREFIX/bin` (`$NPM_CONFIG_PREFIX` on Windows)
/// - **Windows**: `%APPDATA%\npm`
/// - **Unix**: `~/.npm-global/bin`, `~/.npm-packages/bin`
pub fn npm_global_bin_dirs() -> Vec<PathBuf> {
    let mut out = Vec::new();

    if let Ok(prefix) = std::env::var("NPM_CONFIG_PREFIX") {
        if !prefix.is_empty() {
            let prefix = PathBuf::from(prefix);
            if cfg!(windows) {
                out.push(prefix);
            } else {
                out.push(prefix.join("bin"));
            }
        }
    }

    if cfg!(windows) {
        if let Some(appdata) = dirs::data_dir() {
            out.push(appdata.join("npm"));
        }
    } else if let Some(home) = dirs::home_dir() {
        out.push(home.join(".npm-global").join("bin"));
        out.push(home.join(".npm-packages").join("bin"));
    }

    out
}

/// `PATH` entries followed by [`npm_global_bin_dirs`], without duplicates.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect())
        .unwrap_or_default();

    for extra in npm_global_bin_dirs() {
        if !dirs.contains(&extra) {
            dirs.push(extra);
        }
    }
    dirs
}

/// Executable file names to try for `name` on this platform.
fn candidate_names(name: &str) -> Vec<String> {
    if cfg!(windows) && Path::new(name).extension().is_none() {
        let pathext = std::env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".into());
        pathext
            .split(';')
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!("{name}{}", ext.to_ascii_lowercase()))
            .collect()
    } else {
        vec![name.to_string()]
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Look for an executable called `name` in `dirs`, first match wins.
pub fn find_in_dirs(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    let names = candidate_names(name);
    dirs.iter()
        .flat_map(|dir| names.iter().map(move |n| dir.join(n)))
        .find(|candidate| is_executable(candidate))
}

/// Look for an executable on `PATH` and in npm global bin dirs.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    find_in_dirs(name, &search_dirs())
}

// ── Resolution ───────────────────────────────────────────────────────────────

static RESOLVED: OnceLock<Mutex<HashMap<ExternalTool, LocatedTool>>> = OnceLock::new();

/// Resolve `tool` to a runnable command, memoising the result.
pub fn locate(tool: ExternalTool) -> Result<ToolCommand, LocateError> {
    let cache = RESOLVED.get_or_init(|| Mutex::new(HashMap::new()));
    cached(cache, tool, || locate_uncached(tool)).map(|found| found.command)
}

/// Return the entry for `tool` in `cache`, or run `resolve` and store its
/// success. Failures are not cached so a later install is picked up.
fn cached(
    cache: &Mutex<HashMap<ExternalTool, LocatedTool>>,
    tool: ExternalTool,
    resolve: impl FnOnce() -> Result<LocatedTool, LocateError>,
) -> Result<LocatedTool, LocateError> {
    if let Ok(guard) = cache.lock() {
        if let Some(found) = guard.get(&tool) {
            return Ok(found.clone());
        }
    }

    let found = resolve()?;
    if let Ok(mut guard) = cache.lock() {
        guard.insert(tool, found.clone());
    }
    Ok(found)
}

/// Resolve `tool` without touching the process-wide cache.
pub fn locate_uncached(tool: ExternalTool) -> Result<LocatedTool, LocateError> {
    let value = std::env::var(tool.env_var()).ok();
    locate_in(tool, value.as_deref(), &search_dirs())
}

/// Resolve `tool` from an explicit override value and search directories.
///
/// A blank override counts as unset. The binary in `dirs` wins over `npx`.
pub fn locate_in(
    tool: ExternalTool,
    override_value: Option<&str>,
    dirs: &[PathBuf],
) -> Result<LocatedTool, LocateError> {
    let var = tool.env_var();
    if let Some(value) = override_value.filter(|v| !v.trim().is_empty()) {
        let command = ToolCommand::parse(value).ok_or_else(|| LocateError::InvalidOverride {
            var,
            value: value.to_string(),
        })?;
        return Ok(LocatedTool {
            command,
            resolution: Resolution::EnvOverride,
        });
    }

    if let Some(path) = find_in_dirs(tool.binary_name(), dirs) {
        return Ok(LocatedTool {
            command: ToolCommand::new(path),
            resolution: Resolution::SearchPath,
        });
    }

    if tool.npm_package().is_some() {
        if let Some(npx) = find_in_dirs("npx", dirs) {
            return Ok(LocatedTool {
                command: ToolCommand::new(npx).with_arg(tool.binary_name()),
                resolution: Resolution::Npx,
            });
        }
    }

    Err(LocateError::NotFound {
        tool,
        env_var: var,
        hint: tool.install_hint(),
    })
}

/// Resolve every tool, for diagnostics such as `--check-tools`.
pub fn availability_report() -> Vec<(ExternalTool, Result<LocatedTool, LocateError>)> {
    ExternalTool::ALL
        .iter()
        .map(|&tool| (tool, locate_uncached(tool)))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
