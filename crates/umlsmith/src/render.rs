//! Renderer adapter.
//!
//! Runs an external rendering engine on diagram source and resolves the image
//! it produced. Failures are classified so the repair loop can tell an
//! invalid diagram ([`RenderError::Syntax`]) from a broken environment
//! ([`RenderError::Environment`]).

use std::{
    collections::HashMap,
    fs,
    io::{self, Read, Write as _},
    path::{self, Path, PathBuf},
    process::{Child, Command, Output, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant, SystemTime},
};

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::RendererConfig;

/// Failure output fragments that identify a rejected diagram.
const SYNTAX_MARKERS: [&str; 3] = ["syntax error", "error line", "contains errors"];

/// Exit status PlantUML uses when at least one diagram has errors.
const DIAGRAM_ERROR_STATUS: i32 = 200;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Classified rendering failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The engine rejected the diagram source.
    #[error("{0}")]
    Syntax(String),

    /// The engine is missing, hung, or failed for a reason unrelated to the source.
    #[error("{0}")]
    Environment(String),
}

/// An engine that turns diagram source into an image file.
pub trait Renderer {
    /// Renders `source` into `output_dir` and returns the image path.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Syntax`] when the source is invalid and
    /// [`RenderError::Environment`] for every other failure, including a
    /// successful exit that left no image behind.
    fn render(
        &self,
        source: &str,
        output_dir: &Path,
        filename_base: &str,
    ) -> Result<PathBuf, RenderError>;
}

impl<T: Renderer + ?Sized> Renderer for &T {
    fn render(
        &self,
        source: &str,
        output_dir: &Path,
        filename_base: &str,
    ) -> Result<PathBuf, RenderError> {
        (**self).render(source, output_dir, filename_base)
    }
}

impl<T: Renderer + ?Sized> Renderer for Box<T> {
    fn render(
        &self,
        source: &str,
        output_dir: &Path,
        filename_base: &str,
    ) -> Result<PathBuf, RenderError> {
        (**self).render(source, output_dir, filename_base)
    }
}

/// [`Renderer`] backed by a PlantUML subprocess.
#[derive(Debug, Clone)]
pub struct PlantUmlRenderer {
    config: RendererConfig,
}

impl PlantUmlRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Name of the source file written for `filename_base`.
    pub fn source_file_name(filename_base: &str) -> String {
        format!("{filename_base}.puml")
    }

    fn write_source(&self, source: &str, output_dir: &Path, filename_base: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(output_dir)?;
        let target = output_dir.join(Self::source_file_name(filename_base));

        let mut staged = tempfile::NamedTempFile::new_in(output_dir)?;
        staged.write_all(source.as_bytes())?;
        if !source.ends_with('\n') {
            staged.write_all(b"\n")?;
        }
        staged.persist(&target).map_err(|err| err.error)?;
        Ok(target)
    }

    /// Runs the engine on `source_path`.
    ///
    /// The engine inherits the process working directory, so relative paths
    /// in the configured program and arguments resolve the same way they do
    /// for the caller. The source path is absolute; PlantUML writes the image
    /// next to it.
    fn run(&self, source_path: &Path) -> Result<Output, RenderError> {
        let extension = self.config.format().extension();
        let child = Command::new(self.config.program())
            .args(self.config.args())
            .arg(format!("-t{extension}"))
            .arg(source_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                RenderError::Environment(format!(
                    "failed to start renderer `{}`: {err}",
                    self.config.program()
                ))
            })?;

        wait_with_output_timeout(child, self.config.timeout())
    }

    /// Files in `output_dir` named `{filename_base}*.{format}`, sorted.
    fn image_candidates(&self, output_dir: &Path, filename_base: &str) -> Vec<PathBuf> {
        let extension = self.config.format().extension();
        let Ok(pattern) = glob::Pattern::new(&format!(
            "{}*.{extension}",
            glob::Pattern::escape(filename_base)
        )) else {
            return Vec::new();
        };
        let Ok(entries) = fs::read_dir(output_dir) else {
            return Vec::new();
        };

        let mut matches: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| pattern.matches(name))
            })
            .map(|entry| output_dir.join(entry.file_name()))
            .filter(|path| path.is_file())
            .collect();
        matches.sort();
        matches
    }

    /// Picks the image written by this run.
    ///
    /// The exact `{filename_base}.{format}` wins; otherwise the first glob
    /// match that is new or was modified since `before` was taken.
    fn resolve_image(
        &self,
        output_dir: &Path,
        filename_base: &str,
        before: &HashMap<PathBuf, Option<SystemTime>>,
    ) -> Option<PathBuf> {
        let exact = output_dir.join(format!(
            "{filename_base}.{}",
            self.config.format().extension()
        ));
        if exact.is_file() {
            return Some(exact);
        }

        self.image_candidates(output_dir, filename_base)
            .into_iter()
            .find(|path| match before.get(path) {
                None => true,
                Some(modified) => modified_time(path) != *modified,
            })
    }
}

impl Renderer for PlantUmlRenderer {
    fn render(
        &self,
        source: &str,
        output_dir: &Path,
        filename_base: &str,
    ) -> Result<PathBuf, RenderError> {
        let source_path = self
            .write_source(source, output_dir, filename_base)
            .and_then(path::absolute)
            .map_err(|err| {
                RenderError::Environment(format!(
                    "failed to write diagram source to {}: {err}",
                    output_dir.display()
                ))
            })?;

        let stale = output_dir.join(format!(
            "{filename_base}.{}",
            self.config.format().extension()
        ));
        match fs::remove_file(&stale) {
            Ok(()) => debug!(path:? = stale; "Removed stale image"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(RenderError::Environment(format!(
                    "failed to remove stale image {}: {err}",
                    stale.display()
                )));
            }
        }

        // Other requests may share the directory, so older matches are kept
        // on disk and only excluded from resolution.
        let before: HashMap<PathBuf, Option<SystemTime>> = self
            .image_candidates(output_dir, filename_base)
            .into_iter()
            .map(|path| {
                let modified = modified_time(&path);
                (path, modified)
            })
            .collect();

        info!(source:? = source_path, format:% = self.config.format(); "Rendering diagram");
        let output = self.run(&source_path)?;
        classify(&output)?;

        match self.resolve_image(output_dir, filename_base, &before) {
            Some(image) => {
                info!(image:? = image; "Rendered diagram");
                Ok(image)
            }
            None => Err(RenderError::Environment(format!(
                "renderer exited successfully but produced no {} image for `{filename_base}` in {}",
                self.config.format(),
                output_dir.display()
            ))),
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Maps a finished renderer process to success or a classified error.
fn classify(output: &Output) -> Result<(), RenderError> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = format!("{}\n{}", stderr.trim(), stdout.trim());
    let detail = combined.trim().to_string();

    let lowered = detail.to_lowercase();
    let has_marker = SYNTAX_MARKERS.iter().any(|marker| lowered.contains(marker));
    let code = output.status.code();

    if has_marker || code == Some(DIAGRAM_ERROR_STATUS) {
        warn!(status:? = code; "Renderer rejected diagram source");
        let detail = if detail.is_empty() {
            format!("renderer reported a diagram error (exit status {DIAGRAM_ERROR_STATUS})")
        } else {
            detail
        };
        return Err(RenderError::Syntax(detail));
    }

    if !output.status.success() {
        return Err(RenderError::Environment(format!(
            "renderer failed with {}: {detail}",
            output.status
        )));
    }

    Ok(())
}

/// Waits for `child`, killing it once `timeout` has elapsed.
///
/// Both pipes are drained on helper threads while the child runs, so a
/// verbose engine cannot block on a full pipe.
fn wait_with_output_timeout(mut child: Child, timeout: Duration) -> Result<Output, RenderError> {
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let start = Instant::now();
    let status = loop {
        let finished = child.try_wait().map_err(|err| {
            RenderError::Environment(format!("failed to poll renderer status: {err}"))
        })?;
        if let Some(status) = finished {
            break status;
        }

        if start.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            let stderr = collect(stderr);
            return Err(RenderError::Environment(format!(
                "renderer timed out after {}s. stderr: {}",
                timeout.as_secs(),
                String::from_utf8_lossy(&stderr).trim()
            )));
        }

        thread::sleep(POLL_INTERVAL);
    };

    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(err) = pipe.read_to_end(&mut buf) {
            warn!(err:%; "Failed to read renderer output");
        }
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
