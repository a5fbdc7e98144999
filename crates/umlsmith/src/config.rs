//! Configuration types for the generation pipeline.
//!
//! All types implement [`serde::Deserialize`] with every field defaulted, so
//! an empty TOML document is a valid configuration.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining the sections below.
//! - [`GeneratorConfig`] - Text-generation service endpoint, model and timeout.
//! - [`RendererConfig`] - Rendering engine command line, image format and timeout.
//! - [`RepairConfig`] - Retry budget and fallback skeleton caps.
//!
//! The service credential is deliberately absent: it is passed per call.
//!
//! # Example
//!
//! ```
//! # use umlsmith::config::AppConfig;
//! let config = AppConfig::default();
//! assert_eq!(config.repair().max_retries(), 2);
//! assert!(config.validate().is_ok());
//! ```

use std::{fmt, time::Duration};

use serde::Deserialize;

/// Largest repair budget accepted by [`AppConfig::validate`].
pub const MAX_REPAIR_RETRIES: u32 = 3;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Text-generation service section.
    #[serde(default)]
    generator: GeneratorConfig,

    /// Rendering engine section.
    #[serde(default)]
    renderer: RendererConfig,

    /// Repair loop section.
    #[serde(default)]
    repair: RepairConfig,
}

impl AppConfig {
    /// Creates a configuration from its sections.
    ///
    /// # Arguments
    ///
    /// * `generator` - Text-generation service settings.
    /// * `renderer` - Rendering engine settings.
    /// * `repair` - Retry budget and fallback settings.
    pub fn new(generator: GeneratorConfig, renderer: RendererConfig, repair: RepairConfig) -> Self {
        Self {
            generator,
            renderer,
            repair,
        }
    }

    /// Returns the text-generation section.
    pub fn generator(&self) -> &GeneratorConfig {
        &self.generator
    }

    /// Returns the renderer section.
    pub fn renderer(&self) -> &RendererConfig {
        &self.renderer
    }

    /// Returns the repair section.
    pub fn repair(&self) -> &RepairConfig {
        &self.repair
    }

    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns a message naming the offending key when a timeout is zero, the
    /// retry budget is outside `1..=3`, or a fallback cap is zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.generator.timeout_secs == 0 {
            return Err("generator.timeout_secs must be greater than zero".to_string());
        }
        if self.renderer.timeout_secs == 0 {
            return Err("renderer.timeout_secs must be greater than zero".to_string());
        }
        if self.renderer.program.trim().is_empty() {
            return Err("renderer.program must not be empty".to_string());
        }
        if !(1..=MAX_REPAIR_RETRIES).contains(&self.repair.max_retries) {
            return Err(format!(
                "repair.max_retries must be between 1 and {MAX_REPAIR_RETRIES}, got {}",
                self.repair.max_retries
            ));
        }
        if self.repair.max_elapsed_secs == Some(0) {
            return Err("repair.max_elapsed_secs must be greater than zero when set".to_string());
        }
        if self.repair.fallback_node_cap == 0 || self.repair.fallback_edge_cap == 0 {
            return Err("repair fallback caps must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Settings for an OpenAI-compatible chat-completions service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    endpoint: String,
    model: String,
    temperature: f32,
    timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            timeout_secs: 120,
        }
    }
}

impl GeneratorConfig {
    /// Returns a copy pointing at a different endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Returns a copy using a different model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Returns the per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Image formats the renderer can be asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Svg,
}

impl ImageFormat {
    /// Returns the file extension, which is also the renderer's `-t` value.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Command line of the external rendering engine.
///
/// The engine is invoked as `{program} {args...} -t{format} {source file}`
/// from the caller's working directory, so a relative `plantuml.jar` resolves
/// there regardless of the output directory. The source file path is absolute.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    program: String,
    args: Vec<String>,
    format: ImageFormat,
    timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: "java".to_string(),
            args: ["-jar", "plantuml.jar", "-charset", "UTF-8"]
                .map(String::from)
                .to_vec(),
            format: ImageFormat::default(),
            timeout_secs: 60,
        }
    }
}

impl RendererConfig {
    /// Creates a renderer configuration.
    ///
    /// # Arguments
    ///
    /// * `program` - Executable to spawn.
    /// * `args` - Arguments placed before the format flag and source path.
    /// * `format` - Image format to request.
    /// * `timeout` - Wall-clock limit for one render; sub-second parts are rounded up.
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        format: ImageFormat,
        timeout: Duration,
    ) -> Self {
        let whole = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        Self {
            program: program.into(),
            args,
            format,
            timeout_secs: whole,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Returns the wall-clock limit for one render.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry budget and fallback skeleton limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    max_retries: u32,
    max_elapsed_secs: Option<u64>,
    fallback_node_cap: usize,
    fallback_edge_cap: usize,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            max_elapsed_secs: None,
            fallback_node_cap: 10,
            fallback_edge_cap: 20,
        }
    }
}

impl RepairConfig {
    /// Creates a repair configuration.
    pub fn new(
        max_retries: u32,
        max_elapsed: Option<Duration>,
        fallback_node_cap: usize,
        fallback_edge_cap: usize,
    ) -> Self {
        Self {
            max_retries,
            max_elapsed_secs: max_elapsed.map(|budget| budget.as_secs()),
            fallback_node_cap,
            fallback_edge_cap,
        }
    }

    /// Returns the maximum number of repair generation calls per request.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the wall-clock budget for the repair phase, if any.
    pub fn max_elapsed(&self) -> Option<Duration> {
        self.max_elapsed_secs.map(Duration::from_secs)
    }

    pub fn fallback_node_cap(&self) -> usize {
        self.fallback_node_cap
    }

    pub fn fallback_edge_cap(&self) -> usize {
        self.fallback_edge_cap
    }
}
