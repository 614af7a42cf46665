//! On-disk client key storage.
//!
//! Keys live in files named `<context>-<identity>.pgp` containing armored
//! private key material, mode 0600 in directories created with mode 0700.
//! The provider either places them under the XDG data home (simple mode) or
//! dances between the XDG location and a custom one (fallback mode), so
//! that environments with a read-only XDG data home still function.

use std::{
    fs,
    io::Write as _,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::debug;

use crate::{
    error::{Error, Result},
    fsutil, pgp,
};

use super::ClientKey;

/// Lifetime of freshly generated client keys.
const KEY_LIFETIME: Duration = Duration::from_secs(4 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
    Delete,
}

/// Handles loading/saving client keys.
#[derive(Debug, Clone)]
pub struct KeyProvider {
    /// Directory under the XDG data home where keys are stored.
    data_file_directory: PathBuf,
    /// Directory under `custom_base_directory` used when the custom
    /// location is picked.
    custom_data_file_directory: PathBuf,
    /// Base directory of the custom location.
    custom_base_directory: PathBuf,
    key_lifetime: Duration,
    with_fallback: bool,
    prefer_custom_over_xdg: bool,
}

impl KeyProvider {
    /// Creates a provider that stores keys under
    /// `<xdg-data-home>/<data_file_directory>`.
    pub fn new(data_file_directory: impl Into<PathBuf>) -> Self {
        let data_file_directory = data_file_directory.into();

        Self {
            custom_data_file_directory: data_file_directory.clone(),
            custom_base_directory: dirs::data_dir().unwrap_or_default(),
            data_file_directory,
            key_lifetime: KEY_LIFETIME,
            with_fallback: false,
            prefer_custom_over_xdg: false,
        }
    }

    /// Creates a provider with a fallback between the XDG location and a
    /// custom one.
    pub fn with_fallback(
        data_file_directory: impl Into<PathBuf>,
        custom_base_directory: impl Into<PathBuf>,
        custom_data_file_directory: impl Into<PathBuf>,
        prefer_custom_over_xdg: bool,
    ) -> Self {
        Self {
            data_file_directory: data_file_directory.into(),
            custom_base_directory: custom_base_directory.into(),
            custom_data_file_directory: custom_data_file_directory.into(),
            key_lifetime: KEY_LIFETIME,
            with_fallback: true,
            prefer_custom_over_xdg,
        }
    }

    /// Reads a PGP key from the filesystem.
    ///
    /// # Errors
    ///
    /// Fails when the key is missing, invalid (e.g. expired or revoked), or
    /// passphrase-locked — the library does not prompt for passphrases.
    pub fn read_valid_key(&self, context: &str, email: &str) -> Result<ClientKey> {
        let key_path = self.key_file_path(context, email, Access::Read)?;

        let armored = fs::read(&key_path)?;

        let key = pgp::Key::import_armored(&armored)?;

        key.validate()?;

        if !key.is_unlocked() {
            return Err(Error::KeyLocked);
        }

        Ok(ClientKey::new(key, context, email))
    }

    /// Generates a new PGP key pair for the given profile.
    ///
    /// The key is not persisted; call [`KeyProvider::write_key`] for that.
    pub fn generate_key(
        &self,
        context: &str,
        email: &str,
        client_name_with_version: &str,
    ) -> Result<ClientKey> {
        let comment = format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH);

        let key = pgp::Key::generate(client_name_with_version, &comment, email, self.key_lifetime)?;

        Ok(ClientKey::new(key, context, email))
    }

    /// Saves the key pair to disk and returns the save path.
    pub fn write_key(&self, key: &ClientKey) -> Result<PathBuf> {
        let armored = key.armor_private()?;

        let key_path = self.key_file_path(key.context(), key.identity(), Access::Write)?;

        write_private(&key_path, armored.as_bytes())?;

        debug!(path = %key_path.display(), "wrote client key");

        Ok(key_path)
    }

    /// Deletes the key pair from disk.
    ///
    /// A missing file surfaces as a not-found error; the renewal flow
    /// treats that as benign.
    pub fn delete_key(&self, context: &str, email: &str) -> Result<()> {
        let key_path = self.key_file_path(context, email, Access::Delete)?;

        Ok(fs::remove_file(key_path)?)
    }

    fn key_file_path(&self, context: &str, identity: &str, access: Access) -> Result<PathBuf> {
        let key_name = format!("{context}-{identity}.pgp");

        if !self.with_fallback {
            if !self.prefer_custom_over_xdg {
                return self.ensure_xdg_path(&key_name);
            }

            return self.ensure_custom_path(&key_name);
        }

        // For READ and DELETE, regardless of the preferred location, if
        // using the primary location would fail, use the secondary one; if
        // the fallback cannot succeed either, fail using the primary:
        //
        //   prefer XDG:    XDG-miss/custom-hit -> custom, else XDG
        //   prefer custom: XDG-hit/custom-miss -> XDG,    else custom
        //
        // For WRITE, when the preferred location is custom there is no
        // falling back to XDG; when it is XDG, fall back to custom unless
        // the XDG directory is writable.
        if access == Access::Read || access == Access::Delete {
            let xdg_exists = fsutil::file_exists(&self.xdg_dir()?.join(&key_name));
            let custom_exists = fsutil::file_exists(&self.custom_dir().join(&key_name));

            if !self.prefer_custom_over_xdg {
                if !xdg_exists && custom_exists {
                    return self.ensure_custom_path(&key_name);
                }

                return self.ensure_xdg_path(&key_name);
            }

            if xdg_exists && !custom_exists {
                return self.ensure_xdg_path(&key_name);
            }

            return self.ensure_custom_path(&key_name);
        }

        if !self.prefer_custom_over_xdg && fsutil::is_writable(&self.xdg_dir()?) {
            return self.ensure_xdg_path(&key_name);
        }

        self.ensure_custom_path(&key_name)
    }

    fn xdg_dir(&self) -> Result<PathBuf> {
        let base = dirs::data_dir().ok_or(Error::NoDataDir)?;

        Ok(base.join(&self.data_file_directory))
    }

    fn custom_dir(&self) -> PathBuf {
        self.custom_base_directory.join(&self.custom_data_file_directory)
    }

    fn ensure_xdg_path(&self, key_name: &str) -> Result<PathBuf> {
        let base = self.xdg_dir()?;

        create_private_dir(&base)?;

        Ok(base.join(key_name))
    }

    fn ensure_custom_path(&self, key_name: &str) -> Result<PathBuf> {
        let base = self.custom_dir();

        create_private_dir(&base)?;

        Ok(base.join(key_name))
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt as _;

    fs::DirBuilder::new().recursive(true).mode(0o700).create(path)?;

    Ok(())
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;

    Ok(())
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    use std::os::unix::fs::OpenOptionsExt as _;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;

    file.write_all(contents)?;

    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    Ok(fs::write(path, contents)?)
}
