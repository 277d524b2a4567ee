//! Provisioning configuration from YAML

use crate::core::Pipeline;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// File name looked up in the project directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "provision.yaml";

/// Top-level provisioning configuration
///
/// Every field has a built-in default, so an empty document (or no file at
/// all) describes the stock pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Pipeline name (defaults to the application display name)
    pub name: Option<String>,

    /// Config version (optional)
    pub version: Option<String>,

    pub app: AppConfig,

    pub runtime: RuntimeConfig,

    pub package_manager: PackageManagerConfig,

    pub environment: EnvironmentConfig,

    pub build: BuildConfig,

    /// Per-subprocess timeout in seconds (none by default)
    pub timeout_secs: Option<u64>,
}

/// The application being packaged
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Entry-point script, relative to the project directory
    pub entry_script: String,

    /// Name of the produced executable
    pub display_name: String,

    /// Source image for the icon
    pub icon_source: String,

    /// Converted icon path (defaults to `icon_source` with an `.ico` extension)
    pub icon_output: Option<String>,

    /// Auxiliary files bundled next to the application
    pub data_files: Vec<DataFile>,
}

/// A file bundled into the artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFile {
    pub source: String,

    /// Destination directory inside the bundle
    #[serde(default = "default_data_dest")]
    pub dest: String,
}

fn default_data_dest() -> String {
    ".".to_string()
}

/// The runtime the isolated environment is created from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Executable name looked up on PATH
    pub tool: String,

    /// Arguments used to check a candidate actually works (empty = skip check)
    pub verify_args: Vec<String>,

    /// Path components that mark a stub/alias location
    pub stub_components: Vec<String>,

    /// Absolute path prefixes that mark a stub/alias location
    pub stub_prefixes: Vec<String>,

    /// Directories searched after PATH; `${VAR}` is expanded
    pub extra_locations: Vec<String>,

    /// Shown when the runtime is still missing after installation
    pub hint: String,
}

/// The system package manager used for remediation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageManagerConfig {
    pub tool: String,

    pub verify_args: Vec<String>,

    /// Package installed when the runtime is absent
    pub package_id: String,

    /// Install arguments; `{{ package }}` is replaced with `package_id`
    pub install_args: Vec<String>,

    /// Non-zero exit codes meaning "already installed"
    pub already_installed_exit_codes: Vec<i32>,

    /// Output pattern meaning "already installed"
    pub already_installed_pattern: Option<String>,

    /// Whether to use regex pattern matching
    pub use_regex: bool,

    /// Shown when the package manager is absent
    pub hint: String,
}

/// How an existing isolated environment is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentMode {
    /// Delete and rebuild on every run
    Recreate,
    /// Keep a working environment, rebuild only if broken or absent
    Reuse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Environment directory, relative to the project directory
    pub dir: String,

    pub mode: EnvironmentMode,
}

/// Artifact build settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Upgrade the environment's package installer first
    pub upgrade_installer: bool,

    /// Build-time dependencies installed into the environment
    pub dependencies: Vec<String>,

    /// Square icon sizes embedded in the converted icon
    pub icon_sizes: Vec<u32>,

    /// Directory the packaging tool writes to
    pub output_dir: String,

    /// Bundle into a single executable
    pub one_file: bool,

    /// Suppress the console window
    pub windowed: bool,

    /// Extra arguments appended to the packaging command
    pub extra_packager_args: Vec<String>,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            name: None,
            version: None,
            app: AppConfig::default(),
            runtime: RuntimeConfig::default(),
            package_manager: PackageManagerConfig::default(),
            environment: EnvironmentConfig::default(),
            build: BuildConfig::default(),
            timeout_secs: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            entry_script: "mlo_cleaner_gui_dark_multi.py".to_string(),
            display_name: "FiveM MLO Cleaner".to_string(),
            icon_source: "icon.png".to_string(),
            icon_output: None,
            data_files: vec![DataFile {
                source: "icon.png".to_string(),
                dest: default_data_dest(),
            }],
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tool: "python".to_string(),
            verify_args: vec!["--version".to_string()],
            stub_components: vec!["WindowsApps".to_string()],
            stub_prefixes: Vec::new(),
            extra_locations: vec![
                "${LOCALAPPDATA}/Programs/Python/Python312".to_string(),
                "${ProgramFiles}/Python312".to_string(),
            ],
            hint: "Open Settings > Apps > Advanced app settings > App execution aliases, \
                   turn off the python.exe and python3.exe aliases, make sure the Python \
                   install directory is on PATH, then re-run."
                .to_string(),
        }
    }
}

impl Default for PackageManagerConfig {
    fn default() -> Self {
        Self {
            tool: "winget".to_string(),
            verify_args: vec!["--version".to_string()],
            package_id: "Python.Python.3.12".to_string(),
            install_args: [
                "install",
                "--exact",
                "--id",
                "{{ package }}",
                "--silent",
                "--accept-source-agreements",
                "--accept-package-agreements",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            // APPINSTALLER_CLI_ERROR_PACKAGE_ALREADY_INSTALLED, ..._UPDATE_NOT_APPLICABLE
            already_installed_exit_codes: vec![-1978335135, -1978335189],
            already_installed_pattern: Some(
                r"(?i)already installed|no (applicable|available) upgrade".to_string(),
            ),
            use_regex: true,
            hint: "Install \"App Installer\" (winget) from the Microsoft Store, \
                   or install the runtime manually, then re-run."
                .to_string(),
        }
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            dir: ".venv".to_string(),
            mode: EnvironmentMode::Recreate,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            upgrade_installer: true,
            dependencies: vec!["pyinstaller".to_string(), "pillow".to_string()],
            icon_sizes: vec![16, 24, 32, 48, 64, 128, 256],
            output_dir: "dist".to_string(),
            one_file: true,
            windowed: true,
            extra_packager_args: Vec::new(),
        }
    }
}

/// Where the configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl ProvisionConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ProvisionConfig = if yaml.trim().is_empty() {
            ProvisionConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Resolve configuration: explicit file, then `provision.yaml`, then defaults
    pub fn load(explicit: Option<&Path>, project_dir: &Path) -> Result<(Self, ConfigSource)> {
        if let Some(path) = explicit {
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                project_dir.join(path)
            };
            return Ok((Self::from_file(&path)?, ConfigSource::File(path)));
        }

        let candidate = project_dir.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            return Ok((Self::from_file(&candidate)?, ConfigSource::File(candidate)));
        }

        let config = Self::default();
        config.validate()?;
        Ok((config, ConfigSource::Defaults))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("app.entry_script", &self.app.entry_script),
            ("app.display_name", &self.app.display_name),
            ("app.icon_source", &self.app.icon_source),
            ("runtime.tool", &self.runtime.tool),
            ("package_manager.tool", &self.package_manager.tool),
            ("package_manager.package_id", &self.package_manager.package_id),
            ("environment.dir", &self.environment.dir),
            ("build.output_dir", &self.build.output_dir),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("'{}' must not be empty", field);
            }
        }

        if self.build.icon_sizes.is_empty() {
            anyhow::bail!("'build.icon_sizes' must list at least one size");
        }
        if let Some(size) = self.build.icon_sizes.iter().find(|s| **s == 0 || **s > 256) {
            anyhow::bail!("Icon size {} is outside the supported range 1..=256", size);
        }

        // The environment must stay inside the project directory
        let env_dir = Path::new(&self.environment.dir);
        if env_dir.is_absolute() || env_dir.has_root() {
            anyhow::bail!(
                "'environment.dir' must be relative to the project directory: {}",
                self.environment.dir
            );
        }
        if env_dir.components().any(|c| matches!(c, Component::ParentDir)) {
            anyhow::bail!(
                "'environment.dir' must not leave the project directory: {}",
                self.environment.dir
            );
        }
        if !env_dir.components().any(|c| matches!(c, Component::Normal(_))) {
            anyhow::bail!("'environment.dir' must name a subdirectory of the project");
        }

        let mut seen = std::collections::HashSet::new();
        for dep in &self.build.dependencies {
            if dep.trim().is_empty() {
                anyhow::bail!("Empty entry in 'build.dependencies'");
            }
            if !seen.insert(dep.to_lowercase()) {
                anyhow::bail!("Duplicate build dependency: {}", dep);
            }
        }

        if self
            .runtime
            .stub_components
            .iter()
            .chain(&self.runtime.stub_prefixes)
            .any(|s| s.trim().is_empty())
        {
            anyhow::bail!("Stub location rules must not be empty strings");
        }

        for file in &self.app.data_files {
            if file.source.trim().is_empty() || file.dest.trim().is_empty() {
                anyhow::bail!("Data file entries need both 'source' and 'dest'");
            }
        }

        if self.package_manager.use_regex {
            if let Some(pattern) = &self.package_manager.already_installed_pattern {
                Regex::new(pattern).with_context(|| {
                    format!(
                        "'package_manager.already_installed_pattern' is not a valid regex: {}",
                        pattern
                    )
                })?;
            }
        }

        Ok(())
    }

    /// Pipeline name shown in output and history
    pub fn pipeline_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.app.display_name)
    }

    /// Converted icon path, relative to the project directory
    pub fn icon_output(&self) -> PathBuf {
        match &self.app.icon_output {
            Some(path) => PathBuf::from(path),
            None => Path::new(&self.app.icon_source).with_extension("ico"),
        }
    }

    /// Install arguments with `{{ package }}` substituted
    pub fn install_args(&self) -> Vec<String> {
        let mut vars = HashMap::new();
        vars.insert("package".to_string(), self.package_manager.package_id.clone());
        self.package_manager
            .install_args
            .iter()
            .map(|arg| render_template(arg, &vars))
            .collect()
    }

    /// Extra runtime locations with environment variables expanded
    pub fn resolved_extra_locations(&self) -> Vec<PathBuf> {
        self.runtime
            .extra_locations
            .iter()
            .filter_map(|location| {
                let expanded = expand_env_vars(location, |name| std::env::var(name).ok());
                if expanded.is_none() {
                    debug!("Dropping extra location with unset variable: {}", location);
                }
                expanded.map(PathBuf::from)
            })
            .collect()
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}

/// Replace `{{ key }}` placeholders with values
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in variables {
        let placeholder = format!("{{{{ {} }}}}", key);
        rendered = rendered.replace(&placeholder, value);
    }
    rendered
}

/// Expand `${NAME}` references; `None` if any referenced variable is unset
pub fn expand_env_vars<F>(input: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_()]*)\}").ok()?;
    let mut missing = false;
    let expanded = re.replace_all(input, |caps: &regex::Captures| match lookup(&caps[1]) {
        Some(value) => value,
        None => {
            missing = true;
            String::new()
        }
    });
    if missing {
        None
    } else {
        Some(expanded.into_owned())
    }
}
