//! Credential Store (C12): encrypted, domain-keyed credential vault backing
//! the "Credential Store (consumed)" contract named in spec.md §6.
//!
//! Grounded in `original_source/wyn360_cli/credential_manager.py`'s on-disk
//! layout (`.keyfile` + `vault.enc`, 0600 permissions, audit log with no
//! secrets), redesigned per SPEC_FULL.md §4.12: the Python `Fernet`
//! dependency becomes `aes-gcm`, already idiomatic in this ecosystem (see
//! `cdp-adapter`'s own crypto usage), with a random 96-bit nonce prefixed to
//! each ciphertext rather than Fernet's token format.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("encryption error")]
    Encrypt,
    #[error("decryption error: vault is corrupt or the keyfile does not match")]
    Decrypt,
    #[error("no credential stored for domain {0}")]
    NotFound(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredCredential {
    pub username: String,
    pub password: String,
    pub saved_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredSite {
    pub domain: String,
    pub username: String,
    pub saved_at: chrono::DateTime<chrono::Utc>,
}

type Vault = HashMap<String, StoredCredential>;

pub struct CredentialStore {
    keyfile: PathBuf,
    vault_file: PathBuf,
    audit_log: PathBuf,
}

impl CredentialStore {
    /// Opens (creating if absent) the vault rooted at `base_dir`, e.g.
    /// `~/.soulbrowser`. Credentials live under `base_dir/credentials/`, the
    /// audit log under `base_dir/logs/auth_audit.log`.
    pub fn open(base_dir: &Path) -> Result<Self, CredentialError> {
        let credentials_dir = base_dir.join("credentials");
        let logs_dir = base_dir.join("logs");
        std::fs::create_dir_all(&credentials_dir)?;
        std::fs::create_dir_all(&logs_dir)?;

        let store = Self {
            keyfile: credentials_dir.join(".keyfile"),
            vault_file: credentials_dir.join("vault.enc"),
            audit_log: logs_dir.join("auth_audit.log"),
        };
        store.ensure_key()?;
        Ok(store)
    }

    /// Default root `~/.soulbrowser`, per SPEC_FULL.md §4.12.
    pub fn open_default() -> Result<Self, CredentialError> {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::open(&home.join(".soulbrowser"))
    }

    fn ensure_key(&self) -> Result<(), CredentialError> {
        if self.keyfile.exists() {
            return Ok(());
        }
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        std::fs::write(&self.keyfile, key)?;
        set_owner_only(&self.keyfile)?;
        self.log_audit("KEY_CREATED", "new encryption key generated")?;
        Ok(())
    }

    fn cipher(&self) -> Result<Aes256Gcm, CredentialError> {
        let raw = std::fs::read(&self.keyfile)?;
        let key = Key::<Aes256Gcm>::from_slice(&raw);
        Ok(Aes256Gcm::new(key))
    }

    fn log_audit(&self, action: &str, details: &str) -> Result<(), CredentialError> {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log)?;
        writeln!(file, "[{timestamp}] {action}: {details}")?;
        tracing::info!(target: "credential_store", %action, %details, "audit entry written");
        Ok(())
    }

    fn load_vault(&self) -> Result<Vault, CredentialError> {
        if !self.vault_file.exists() {
            return Ok(Vault::new());
        }
        let raw = std::fs::read(&self.vault_file)?;
        if raw.len() < NONCE_LEN {
            return Err(CredentialError::Decrypt);
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let cipher = self.cipher()?;
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CredentialError::Decrypt)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    fn save_vault(&self, vault: &Vault) -> Result<(), CredentialError> {
        let plaintext = serde_json::to_vec(vault)?;
        let cipher = self.cipher()?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_ref())
            .map_err(|_| CredentialError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        std::fs::write(&self.vault_file, out)?;
        set_owner_only(&self.vault_file)?;
        Ok(())
    }

    pub fn save_credential(
        &self,
        domain: &str,
        username: &str,
        password: &str,
    ) -> Result<(), CredentialError> {
        let mut vault = self.load_vault()?;
        vault.insert(
            domain.to_string(),
            StoredCredential {
                username: username.to_string(),
                password: password.to_string(),
                saved_at: chrono::Utc::now(),
            },
        );
        self.save_vault(&vault)?;
        self.log_audit("CREDENTIAL_SAVED", &format!("domain={domain}, username={username}"))?;
        Ok(())
    }

    pub fn get_credential(&self, domain: &str) -> Result<Option<StoredCredential>, CredentialError> {
        let vault = self.load_vault()?;
        if let Some(credential) = vault.get(domain) {
            self.log_audit("CREDENTIAL_ACCESSED", &format!("domain={domain}"))?;
            Ok(Some(credential.clone()))
        } else {
            Ok(None)
        }
    }

    /// Never returns the password.
    pub fn list_stored_sites(&self) -> Result<Vec<StoredSite>, CredentialError> {
        let vault = self.load_vault()?;
        Ok(vault
            .into_iter()
            .map(|(domain, c)| StoredSite { domain, username: c.username, saved_at: c.saved_at })
            .collect())
    }

    pub fn delete_credential(&self, domain: &str) -> Result<bool, CredentialError> {
        let mut vault = self.load_vault()?;
        if vault.remove(domain).is_some() {
            self.save_vault(&vault)?;
            self.log_audit("CREDENTIAL_DELETED", &format!("domain={domain}"))?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn clear_all_credentials(&self) -> Result<(), CredentialError> {
        self.save_vault(&Vault::new())?;
        self.log_audit("ALL_CREDENTIALS_CLEARED", "user cleared all stored credentials")?;
        Ok(())
    }

    pub fn has_credential(&self, domain: &str) -> Result<bool, CredentialError> {
        Ok(self.load_vault()?.contains_key(domain))
    }
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> Result<(), CredentialError> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> Result<(), CredentialError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn temp_store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    #[serial]
    fn save_and_get_round_trips() {
        let (_dir, store) = temp_store();
        store.save_credential("example.com", "alice", "hunter2").unwrap();
        let credential = store.get_credential("example.com").unwrap().unwrap();
        assert_eq!(credential.username, "alice");
        assert_eq!(credential.password, "hunter2");
    }

    #[test]
    #[serial]
    fn list_stored_sites_never_reveals_password() {
        let (_dir, store) = temp_store();
        store.save_credential("example.com", "alice", "hunter2").unwrap();
        let sites = store.list_stored_sites().unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].username, "alice");
    }

    #[test]
    #[serial]
    fn delete_removes_only_named_domain() {
        let (_dir, store) = temp_store();
        store.save_credential("a.com", "u1", "p1").unwrap();
        store.save_credential("b.com", "u2", "p2").unwrap();
        assert!(store.delete_credential("a.com").unwrap());
        assert!(!store.has_credential("a.com").unwrap());
        assert!(store.has_credential("b.com").unwrap());
    }

    #[test]
    #[serial]
    fn clear_all_empties_vault() {
        let (_dir, store) = temp_store();
        store.save_credential("a.com", "u1", "p1").unwrap();
        store.clear_all_credentials().unwrap();
        assert!(store.list_stored_sites().unwrap().is_empty());
    }

    #[test]
    #[serial]
    fn audit_log_never_contains_the_password() {
        let (_dir, store) = temp_store();
        store.save_credential("example.com", "alice", "super-secret-password").unwrap();
        let contents = std::fs::read_to_string(&store.audit_log).unwrap();
        assert!(!contents.contains("super-secret-password"));
        assert!(contents.contains("CREDENTIAL_SAVED"));
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn vault_and_keyfile_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, store) = temp_store();
        store.save_credential("example.com", "alice", "hunter2").unwrap();
        let vault_mode = std::fs::metadata(&store.vault_file).unwrap().permissions().mode() & 0o777;
        let key_mode = std::fs::metadata(&store.keyfile).unwrap().permissions().mode() & 0o777;
        assert_eq!(vault_mode, 0o600);
        assert_eq!(key_mode, 0o600);
    }

    #[test]
    #[serial]
    fn reopening_reuses_the_existing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store1 = CredentialStore::open(dir.path()).unwrap();
        store1.save_credential("example.com", "alice", "hunter2").unwrap();
        let store2 = CredentialStore::open(dir.path()).unwrap();
        let credential = store2.get_credential("example.com").unwrap().unwrap();
        assert_eq!(credential.username, "alice");
    }
}
