use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

fn platform_home() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        dirs::config_dir()
    } else {
        dirs::home_dir()
    }
}

fn expand_tilde(raw: &str) -> Result<PathBuf> {
    let Some(rest) = raw.strip_prefix('~') else {
        return Ok(PathBuf::from(raw));
    };
    let home = platform_home().context("cannot expand '~': home directory is not set")?;
    let rest = rest.trim_start_matches(['/', '\\']);
    Ok(if rest.is_empty() { home } else { home.join(rest) })
}

/// Resolves `raw` (or `<platform home>/<default_subdir>` when absent) to an absolute path.
///
/// `~` is expanded, relative paths are joined to the current directory. With `create`,
/// the directory is created if missing.
pub fn resolve_home_dir(raw: Option<String>, default_subdir: &str, create: bool) -> Result<PathBuf> {
    let path = match raw {
        Some(raw) => expand_tilde(raw.trim())?,
        None => platform_home()
            .context("home directory is not set")?
            .join(default_subdir),
    };
    let path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .context("cannot read current directory")?
            .join(path)
    };

    if create {
        std::fs::create_dir_all(&path)
            .with_context(|| format!("cannot create '{}'", path.display()))?;
    } else if path.exists() && !path.is_dir() {
        bail!("'{}' is not a directory", path.display());
    }
    Ok(path)
}

/// Joins `file` to `base` unless it is already absolute.
pub fn resolve_against(file: &str, base: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn absolute_path_is_created() {
        let tmp = tempdir().unwrap();
        let target = tmp.path().join("a/b");
        let resolved =
            resolve_home_dir(Some(target.to_string_lossy().into_owned()), ".x", true).unwrap();
        assert_eq!(resolved, target);
        assert!(target.is_dir());
    }

    #[test]
    fn file_in_the_way_is_rejected() {
        let tmp = tempdir().unwrap();
        let file = tmp.path().join("f");
        std::fs::write(&file, "").unwrap();
        assert!(resolve_home_dir(Some(file.to_string_lossy().into_owned()), ".x", false).is_err());
    }

    #[test]
    fn tilde_expands_under_platform_home() {
        let Some(home) = platform_home() else {
            return;
        };
        assert_eq!(expand_tilde("~").unwrap(), home);
        assert_eq!(expand_tilde("~/.jsonapi/logs").unwrap(), home.join(".jsonapi/logs"));
        assert_eq!(expand_tilde("plain/dir").unwrap(), PathBuf::from("plain/dir"));
    }

    #[test]
    fn relative_files_join_base() {
        let base = Path::new("/srv/app");
        assert_eq!(resolve_against("logs/a.log", base), base.join("logs/a.log"));
        #[cfg(unix)]
        assert_eq!(resolve_against("/var/a.log", base), PathBuf::from("/var/a.log"));
    }
}
