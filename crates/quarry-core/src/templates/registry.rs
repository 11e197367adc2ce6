//! The set of compiled routes, built once at startup.

// Internal imports (std, crate)
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::task;

use crate::{
    config::{is_template_extension, Config},
    error::Result,
};

use super::RouteDefinition;

/// Read-only collection of compiled routes, ordered by template path
#[derive(Debug, Clone, Default)]
pub struct RouteRegistry {
    routes: Arc<Vec<RouteDefinition>>,
}

impl RouteRegistry {
    /// Wrap already compiled routes
    pub fn new(routes: Vec<RouteDefinition>) -> Self {
        Self {
            routes: Arc::new(routes),
        }
    }

    /// Compile every template under `config.template_dir`.
    ///
    /// Fails on the first template whose metadata cannot be parsed; a partially
    /// compiled registry is never returned.
    pub async fn load(config: &Config) -> Result<Self> {
        let root = config.template_dir.clone();
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Template directory not found: {}", root.display()),
            )
            .into());
        }

        let files = Self::discover_template_files(&root, &config.template_extensions).await?;

        let mut routes = Vec::with_capacity(files.len());
        for file in &files {
            routes.push(RouteDefinition::compile(file, &root).await?);
        }

        log::info!(
            "Compiled {} route(s) from {}",
            routes.len(),
            root.display()
        );
        Ok(Self::new(routes))
    }

    /// Discovers all template files in the given directory and its subdirectories.
    ///
    /// Hidden files and directories are skipped. The result is sorted so that
    /// route order does not depend on the filesystem.
    pub async fn discover_template_files(
        dir: &Path,
        extensions: &[String],
    ) -> Result<Vec<PathBuf>> {
        let dir_buf = dir.to_path_buf();
        let extensions = extensions.to_vec();

        let files = task::spawn_blocking(move || {
            let mut templates = Vec::new();

            fn walk_dir(
                dir: &Path,
                extensions: &[String],
                templates: &mut Vec<PathBuf>,
            ) -> std::io::Result<()> {
                for entry in std::fs::read_dir(dir)? {
                    let entry = entry?;
                    let path = entry.path();

                    if entry.file_name().to_string_lossy().starts_with('.') {
                        continue;
                    }

                    if path.is_dir() {
                        walk_dir(&path, extensions, templates)?;
                    } else if path
                        .extension()
                        .and_then(|s| s.to_str())
                        .is_some_and(|ext| is_template_extension(extensions, ext))
                    {
                        templates.push(path);
                    }
                }
                Ok(())
            }

            walk_dir(&dir_buf, &extensions, &mut templates)?;
            templates.sort();
            Ok::<_, std::io::Error>(templates)
        })
        .await
        .map_err(|e| io::Error::other(format!("Failed to join blocking task: {}", e)))??;

        Ok(files)
    }

    /// All routes, in template path order
    pub fn routes(&self) -> &[RouteDefinition] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RouteDefinition> {
        self.routes.iter()
    }
}

impl<'a> IntoIterator for &'a RouteRegistry {
    type Item = &'a RouteDefinition;
    type IntoIter = std::slice::Iter<'a, RouteDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::HttpMethod;
    use crate::Error;
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_load_compiles_tree_in_path_order() -> crate::Result<()> {
        let dir = tempdir()?;
        write(dir.path(), "music/bands.rq", "SELECT * WHERE { ?s ?p ?o }");
        write(dir.path(), "albums.sparql", "#+ method: POST\nASK { ?s ?p ?o }");
        write(dir.path(), "README.md", "# not a template");
        write(dir.path(), ".hidden/secret.rq", "SELECT * WHERE { ?s ?p ?o }");

        let registry = RouteRegistry::load(&Config::new(dir.path())).await?;
        let paths: Vec<_> = registry.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/albums", "/music/bands"]);
        assert_eq!(registry.routes()[0].method, HttpMethod::Post);
        assert_eq!(registry.routes()[1].method, HttpMethod::Get);
        assert_eq!(registry.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_fails_fast_on_malformed_metadata() -> crate::Result<()> {
        let dir = tempdir()?;
        write(dir.path(), "good.rq", "SELECT * WHERE { ?s ?p ?o }");
        write(dir.path(), "bad.rq", "#+ tags: [unclosed\nSELECT * WHERE { ?s ?p ?o }");

        let result = RouteRegistry::load(&Config::new(dir.path())).await;
        assert!(matches!(result, Err(Error::MalformedMetadata { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_load_missing_directory() {
        let result = RouteRegistry::load(&Config::new("/nonexistent/quarry")).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
