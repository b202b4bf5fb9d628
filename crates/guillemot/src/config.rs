use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::shortcodes::{LinkOptions, Shortcodes};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("passthrough path does not exist: {0:?}")]
    MissingPassthrough(PathBuf),

    #[error("passthrough path must stay inside the site root: {0:?}")]
    PassthroughOutsideRoot(PathBuf),

    #[error("input and output directories are the same: {0:?}")]
    OverlappingDirectories(PathBuf),

    #[error("failed to walk passthrough path: {0}")]
    Walk(#[from] walkdir::Error),
}

/// The directories the generator reads from and writes to, relative to the
/// site root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Directories {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Resolved against the input directory.
    pub layouts: PathBuf,
}

impl Default for Directories {
    fn default() -> Self {
        Self {
            input: PathBuf::from("views"),
            output: PathBuf::from("dist"),
            layouts: PathBuf::from("layouts"),
        }
    }
}

/// A file or directory that is copied into the output unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PassthroughCopy {
    pub path: PathBuf,
    /// Whether the site is broken without this path.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl PassthroughCopy {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            required: true,
        }
    }

    /// A path that is copied when present, like a `CNAME` or `favicon.ico`.
    pub fn optional(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            required: false,
        }
    }
}

fn default_passthrough_copy() -> Vec<PassthroughCopy> {
    vec![PassthroughCopy::new("css")]
}

/// Adds a declaration, replacing any earlier one for the same path.
fn declare_passthrough(declarations: &mut Vec<PassthroughCopy>, passthrough: PassthroughCopy) {
    match declarations.iter_mut().find(|declared| declared.path == passthrough.path) {
        Some(declared) => *declared = passthrough,
        None => declarations.push(passthrough),
    }
}

/// A single file the generator should copy, with both paths resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassthroughFile {
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SiteConfigFile {
    directories: Directories,
    links: LinkOptions,
    passthrough_copy: Vec<PassthroughCopy>,
    passthrough_file_copy: bool,
}

impl Default for SiteConfigFile {
    fn default() -> Self {
        Self {
            directories: Directories::default(),
            links: LinkOptions::default(),
            passthrough_copy: default_passthrough_copy(),
            passthrough_file_copy: true,
        }
    }
}

/// Everything the generator needs to know about a site at startup.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    root_path: PathBuf,
    pub directories: Directories,
    pub links: LinkOptions,
    pub passthrough_copy: Vec<PassthroughCopy>,
    pub passthrough_file_copy: bool,
    pub shortcodes: Shortcodes,
}

impl SiteConfig {
    pub fn builder() -> SiteConfigBuilder<()> {
        SiteConfigBuilder::new()
    }

    /// Reads the config from a TOML file. The file's directory is the site
    /// root.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let root_path = path.parent().unwrap_or_else(|| Path::new("")).to_owned();

        debug!(path = %path.display(), "loading site config");

        Self::parse(&text, root_path)
    }

    pub fn parse(text: &str, root_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file: SiteConfigFile = toml::from_str(text)?;

        let mut passthrough_copy = Vec::with_capacity(file.passthrough_copy.len());
        for passthrough in file.passthrough_copy {
            declare_passthrough(&mut passthrough_copy, passthrough);
        }

        Ok(Self {
            root_path: root_path.as_ref().to_owned(),
            shortcodes: Shortcodes::builtin(&file.links),
            directories: file.directories,
            links: file.links,
            passthrough_copy,
            passthrough_file_copy: file.passthrough_file_copy,
        })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn input_path(&self) -> PathBuf {
        self.root_path.join(&self.directories.input)
    }

    pub fn output_path(&self) -> PathBuf {
        self.root_path.join(&self.directories.output)
    }

    pub fn layouts_path(&self) -> PathBuf {
        self.input_path().join(&self.directories.layouts)
    }

    /// Checks that the directories don't collide and that every required
    /// passthrough path exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_path() == self.output_path() {
            return Err(ConfigError::OverlappingDirectories(self.input_path()));
        }

        for passthrough in &self.passthrough_copy {
            self.passthrough_source(passthrough)?;
        }

        Ok(())
    }

    /// Expands the passthrough declarations into the individual files to
    /// copy, in a stable order.
    pub fn resolve_passthrough(&self) -> Result<Vec<PassthroughFile>, ConfigError> {
        if !self.passthrough_file_copy {
            debug!("passthrough file copy is disabled");
            return Ok(Vec::new());
        }

        let output_path = self.output_path();
        let mut files = Vec::new();

        for passthrough in &self.passthrough_copy {
            let Some(source) = self.passthrough_source(passthrough)? else {
                continue;
            };

            let destination_root = output_path.join(&passthrough.path);

            for entry in WalkDir::new(&source).follow_links(true).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_dir() {
                    continue;
                }

                let relative = entry.path().strip_prefix(&source).unwrap_or(entry.path());
                let destination = if relative.as_os_str().is_empty() {
                    destination_root.clone()
                } else {
                    destination_root.join(relative)
                };

                files.push(PassthroughFile {
                    source: entry.into_path(),
                    destination,
                });
            }
        }

        debug!(count = files.len(), "resolved passthrough files");

        Ok(files)
    }

    /// Returns where the passthrough path lives on disk, or `None` when an
    /// optional path is absent.
    fn passthrough_source(
        &self,
        passthrough: &PassthroughCopy,
    ) -> Result<Option<PathBuf>, ConfigError> {
        let escapes_root = passthrough.path.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes_root {
            return Err(ConfigError::PassthroughOutsideRoot(passthrough.path.clone()));
        }

        let source = self.root_path.join(&passthrough.path);
        if source.exists() {
            return Ok(Some(source));
        }

        if passthrough.required {
            warn!(path = %source.display(), "required passthrough path is missing");
            return Err(ConfigError::MissingPassthrough(source));
        }

        debug!(path = %source.display(), "skipping missing optional passthrough path");

        Ok(None)
    }
}

pub struct SiteConfigBuilder<T> {
    state: T,
}

impl SiteConfigBuilder<()> {
    pub fn new() -> Self {
        Self { state: () }
    }

    pub fn root(self, root_path: impl AsRef<Path>) -> SiteConfigBuilder<WithRootPath> {
        SiteConfigBuilder {
            state: WithRootPath {
                root_path: root_path.as_ref().to_owned(),
                directories: Directories::default(),
                links: LinkOptions::default(),
                passthrough_copy: default_passthrough_copy(),
                passthrough_file_copy: true,
                shortcodes: None,
            },
        }
    }
}

impl Default for SiteConfigBuilder<()> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WithRootPath {
    root_path: PathBuf,
    directories: Directories,
    links: LinkOptions,
    passthrough_copy: Vec<PassthroughCopy>,
    passthrough_file_copy: bool,
    shortcodes: Option<Box<dyn FnOnce(&LinkOptions) -> Shortcodes>>,
}

impl SiteConfigBuilder<WithRootPath> {
    pub fn directories(mut self, directories: Directories) -> Self {
        self.state.directories = directories;
        self
    }

    pub fn link_options(mut self, links: LinkOptions) -> Self {
        self.state.links = links;
        self
    }

    /// Declares a passthrough path. Declaring the same path again replaces
    /// the earlier declaration.
    pub fn passthrough_copy(mut self, passthrough: PassthroughCopy) -> Self {
        declare_passthrough(&mut self.state.passthrough_copy, passthrough);
        self
    }

    pub fn passthrough_file_copy(mut self, enabled: bool) -> Self {
        self.state.passthrough_file_copy = enabled;
        self
    }

    /// Uses the shortcodes returned by `shortcodes` instead of the built-in
    /// ones. It is called with the final link options when the config is
    /// built, so the registry always links the same way as `links`.
    pub fn shortcodes(
        mut self,
        shortcodes: impl FnOnce(&LinkOptions) -> Shortcodes + 'static,
    ) -> Self {
        self.state.shortcodes = Some(Box::new(shortcodes));
        self
    }

    pub fn build(self) -> SiteConfig {
        let state = self.state;
        let shortcodes = match state.shortcodes {
            Some(shortcodes) => shortcodes(&state.links),
            None => Shortcodes::builtin(&state.links),
        };

        SiteConfig {
            root_path: state.root_path,
            directories: state.directories,
            links: state.links,
            passthrough_copy: state.passthrough_copy,
            passthrough_file_copy: state.passthrough_file_copy,
            shortcodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::shortcodes::Shortcode;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("fixtures")
            .join(name)
    }

    #[test]
    fn test_defaults() {
        let config = SiteConfig::builder().root("site").build();

        assert_eq!(config.input_path(), PathBuf::from("site/views"));
        assert_eq!(config.output_path(), PathBuf::from("site/dist"));
        assert_eq!(config.layouts_path(), PathBuf::from("site/views/layouts"));
        assert_eq!(config.passthrough_copy, vec![PassthroughCopy::new("css")]);
        assert!(config.passthrough_file_copy);
        assert_eq!(config.links, LinkOptions::default());
    }

    #[test]
    fn test_parse() {
        let text = indoc! {r#"
            passthrough_file_copy = true

            [directories]
            input = "src"
            output = "public"

            [links]
            page_base_path = "/pages"

            [[passthrough_copy]]
            path = "css"

            [[passthrough_copy]]
            path = "CNAME"
            required = false
        "#};

        let config = SiteConfig::parse(text, "site").unwrap();

        assert_eq!(
            config.directories,
            Directories {
                input: PathBuf::from("src"),
                output: PathBuf::from("public"),
                layouts: PathBuf::from("layouts"),
            }
        );
        assert_eq!(
            config.passthrough_copy,
            vec![PassthroughCopy::new("css"), PassthroughCopy::optional("CNAME")]
        );
        assert_eq!(
            config.shortcodes.invoke("page", &["intro"]).unwrap(),
            r#"<a href="/pages/intro">intro</a>"#
        );
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = SiteConfig::parse("", "site").unwrap();

        assert_eq!(config.directories, Directories::default());
        assert_eq!(config.passthrough_copy, vec![PassthroughCopy::new("css")]);
        assert_eq!(config.shortcodes.len(), 4);
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        let text = indoc! {r#"
            [directories]
            inputs = "views"
        "#};

        assert!(matches!(
            SiteConfig::parse(text, "site"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let config = SiteConfig::from_path(fixture("site").join("site.toml")).unwrap();

        assert_eq!(config.root_path(), fixture("site"));
        assert_eq!(config.output_path(), fixture("site").join("dist"));
        assert!(config
            .passthrough_copy
            .contains(&PassthroughCopy::optional("favicon.ico")));
    }

    #[test]
    fn test_from_missing_path() {
        assert!(matches!(
            SiteConfig::from_path(fixture("nowhere").join("site.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_validate() {
        let config = SiteConfig::from_path(fixture("site").join("site.toml")).unwrap();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_required_passthrough() {
        let config = SiteConfig::builder()
            .root(fixture("bare"))
            .passthrough_copy(PassthroughCopy::optional("CNAME"))
            .build();

        match config.validate() {
            Err(ConfigError::MissingPassthrough(path)) => {
                assert_eq!(path, fixture("bare").join("css"));
            }
            other => panic!("expected a missing passthrough error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_passthrough_outside_root() {
        for path in ["/etc", "../CNAME", "css/../../CNAME"] {
            let config = SiteConfig::builder()
                .root(fixture("site"))
                .passthrough_copy(PassthroughCopy::new(path))
                .build();

            match config.validate() {
                Err(ConfigError::PassthroughOutsideRoot(rejected)) => {
                    assert_eq!(rejected, PathBuf::from(path));
                }
                other => panic!("expected {path:?} to be rejected, got {other:?}"),
            }
            assert!(matches!(
                config.resolve_passthrough(),
                Err(ConfigError::PassthroughOutsideRoot(_))
            ));
        }
    }

    #[test]
    fn test_validate_overlapping_directories() {
        let config = SiteConfig::builder()
            .root(fixture("site"))
            .directories(Directories {
                input: PathBuf::from("dist"),
                ..Directories::default()
            })
            .build();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::OverlappingDirectories(_))
        ));
    }

    #[test]
    fn test_resolve_passthrough() {
        let root = fixture("site");
        let config = SiteConfig::from_path(root.join("site.toml")).unwrap();

        let files = config.resolve_passthrough().unwrap();

        assert_eq!(
            files,
            vec![
                PassthroughFile {
                    source: root.join("css/print/print.css"),
                    destination: root.join("dist/css/print/print.css"),
                },
                PassthroughFile {
                    source: root.join("css/style.css"),
                    destination: root.join("dist/css/style.css"),
                },
                PassthroughFile {
                    source: root.join("CNAME"),
                    destination: root.join("dist/CNAME"),
                },
            ]
        );
    }

    #[test]
    fn test_resolve_passthrough_disabled() {
        let config = SiteConfig::builder()
            .root(fixture("site"))
            .passthrough_file_copy(false)
            .build();

        assert!(config.resolve_passthrough().unwrap().is_empty());
    }

    #[test]
    fn test_builder_with_custom_shortcodes() {
        let config = SiteConfig::builder()
            .root("site")
            .link_options(LinkOptions::new("/pages"))
            .passthrough_copy(PassthroughCopy::new("css"))
            .passthrough_copy(PassthroughCopy::optional("CNAME"))
            .shortcodes(|links| {
                let mut shortcodes = Shortcodes::builtin(links);
                shortcodes
                    .register("year", Shortcode::inline(&[], |_| Ok("2024".to_string())))
                    .unwrap();
                shortcodes
            })
            .build();

        assert_eq!(config.shortcodes.invoke("year", &[]).unwrap(), "2024");
        assert_eq!(
            config.passthrough_copy,
            vec![PassthroughCopy::new("css"), PassthroughCopy::optional("CNAME")]
        );
    }

    #[test]
    fn test_custom_shortcodes_use_final_link_options() {
        let config = SiteConfig::builder()
            .root("site")
            .shortcodes(Shortcodes::builtin)
            .link_options(LinkOptions::new("/docs"))
            .build();

        assert_eq!(
            config.shortcodes.invoke("page", &["intro"]).unwrap(),
            r#"<a href="/docs/intro">intro</a>"#
        );
    }

    #[test]
    fn test_builder_redeclaring_a_path_replaces_it() {
        let root = fixture("site");
        let config = SiteConfig::builder()
            .root(&root)
            .passthrough_copy(PassthroughCopy::optional("css"))
            .build();

        assert_eq!(config.passthrough_copy, vec![PassthroughCopy::optional("css")]);
        assert_eq!(config.resolve_passthrough().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_redeclaring_a_path_replaces_it() {
        let text = indoc! {r#"
            [[passthrough_copy]]
            path = "css"

            [[passthrough_copy]]
            path = "CNAME"
            required = false

            [[passthrough_copy]]
            path = "css"
            required = false
        "#};

        let config = SiteConfig::parse(text, fixture("site")).unwrap();

        assert_eq!(
            config.passthrough_copy,
            vec![PassthroughCopy::optional("css"), PassthroughCopy::optional("CNAME")]
        );
        assert_eq!(config.resolve_passthrough().unwrap().len(), 3);
    }
}
