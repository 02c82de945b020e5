use std::env;
#[cfg(unix)]
use std::fs::OpenOptions;
#[cfg(unix)]
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;

pub const KEY_FILE_NAME: &str = "api_key";

/// Host-side credential handling: whether a key is ready, and a way to let
/// the user pick one. `prompt_credential_selection` blocks until the user is
/// done.
pub trait CredentialHost {
    fn has_usable_credential(&self) -> anyhow::Result<bool>;
    fn prompt_credential_selection(&self) -> anyhow::Result<()>;
}

/// Where the API key lives. A key selected by the user (the key file) takes
/// precedence over `GEMINI_API_KEY` / `GOOGLE_API_KEY`.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    key_file: Option<PathBuf>,
}

impl KeyStore {
    pub fn new(key_file: Option<PathBuf>) -> Self {
        Self { key_file }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(Some(dir.join(KEY_FILE_NAME)))
    }

    pub fn key_file(&self) -> Option<&Path> {
        self.key_file.as_deref()
    }

    pub fn resolve(&self) -> Option<String> {
        self.stored_key()
            .or_else(|| non_empty_env("GEMINI_API_KEY"))
            .or_else(|| non_empty_env("GOOGLE_API_KEY"))
    }

    pub fn stored_key(&self) -> Option<String> {
        let path = self.key_file.as_ref()?;
        let raw = std::fs::read_to_string(path).ok()?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.to_string())
    }

    pub fn store(&self, key: &str) -> anyhow::Result<()> {
        let Some(path) = self.key_file.as_ref() else {
            anyhow::bail!("no key file configured");
        };
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("refusing to store an empty API key");
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        write_private(path, key).with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Writes `key` to a file only the owner can read. A new file is created
/// with mode 0600; an existing one is narrowed before it is truncated.
#[cfg(unix)]
fn write_private(path: &Path, key: &str) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.set_len(0)?;
    file.write_all(key.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, key: &str) -> std::io::Result<()> {
    std::fs::write(path, key)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::KeyStore;

    #[test]
    fn stored_key_round_trips_trimmed() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let keys = KeyStore::in_dir(&temp.path().join("studio"));
        assert_eq!(keys.stored_key(), None);

        keys.store("  secret-key \n")?;
        assert_eq!(keys.stored_key().as_deref(), Some("secret-key"));
        assert_eq!(keys.resolve().as_deref(), Some("secret-key"));
        Ok(())
    }

    #[test]
    fn store_rejects_empty_keys_and_missing_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        assert!(KeyStore::in_dir(temp.path()).store("   ").is_err());
        assert!(KeyStore::new(None).store("key").is_err());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn stored_key_is_private_to_the_owner() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir()?;
        let keys = KeyStore::in_dir(temp.path());
        keys.store("secret")?;
        let mode = std::fs::metadata(keys.key_file().unwrap())?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn replacing_a_readable_key_file_narrows_it_first() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir()?;
        let keys = KeyStore::in_dir(temp.path());
        let path = keys.key_file().unwrap().to_path_buf();
        std::fs::write(&path, "old-and-much-longer-key")?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644))?;

        keys.store("new")?;
        assert_eq!(std::fs::metadata(&path)?.permissions().mode() & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(&path)?, "new");
        Ok(())
    }
}
