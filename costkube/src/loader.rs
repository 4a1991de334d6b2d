use std::{
    env,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::debug;

use crate::{cache, ConfigDocument, Error, Result};

pub const KUBECONFIG: &str = "KUBECONFIG";

/// `~/.kube`, when a home directory can be determined.
pub fn kube_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kube"))
}

/// Picks the kubeconfig to use. An explicit path is returned as-is, even when
/// it does not exist; reading it is what fails. Otherwise `KUBECONFIG` is
/// consulted, then `~/.kube/config`.
pub fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
    resolve_from(path, env::var_os(KUBECONFIG), kube_dir())
}

fn resolve_from(
    path: Option<&Path>,
    kubeconfig_env: Option<OsString>,
    kube_dir: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }

    // Only the first existing entry of a path list is used; entries are
    // never merged.
    if let Some(list) = kubeconfig_env {
        if let Some(found) = env::split_paths(&list)
            .filter(|p| !p.as_os_str().is_empty())
            .find(|p| p.is_file())
        {
            debug!(path = %found.display(), "using kubeconfig from {KUBECONFIG}");
            return Ok(found);
        }
    }

    if let Some(default) = kube_dir.map(|dir| dir.join("config")) {
        if default.is_file() {
            debug!(path = %default.display(), "using default kubeconfig");
            return Ok(default);
        }
    }

    Err(Error::ConfigNotFound { path: None })
}

/// Loads the kubeconfig at `path`, or the one found in the default locations.
pub fn load_kubeconfig(path: Option<&Path>) -> Result<ConfigDocument> {
    let path = resolve_path(path)?;
    ConfigDocument::read_from(path)
}

/// Like [`load_kubeconfig`] but shares parsed documents through the
/// process-wide cache. Entries are keyed on path and modification time, so an
/// edited file is parsed again.
pub fn load_cached(path: Option<&Path>) -> Result<Arc<ConfigDocument>> {
    let path = resolve_path(path)?;
    let key = key_for(&path)?;

    if let Some(doc) = cache::cache_get(&key) {
        debug!(path = %path.display(), "kubeconfig cache hit");
        return Ok(doc);
    }

    debug!(path = %path.display(), "kubeconfig cache miss");
    let doc = Arc::new(ConfigDocument::read_from(&path)?);
    let cache = cache::global();
    cache.cleanup();
    cache.put_shared(key, Arc::clone(&doc));
    Ok(doc)
}

fn key_for(path: &Path) -> Result<String> {
    let meta = fs::metadata(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => Error::ConfigNotFound {
            path: Some(path.to_path_buf()),
        },
        _ => Error::ConfigUnreadable {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let modified = meta.modified().map_err(|source| Error::ConfigUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(cache::cache_key(path, modified))
}
