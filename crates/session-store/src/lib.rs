//! Session Store (C13): domain-keyed session cookies with TTL, backing the
//! "Session Store (consumed)" contract named in spec.md §6.
//!
//! Grounded in `original_source/wyn360_cli/session_manager.py`'s one-file-
//! per-domain layout and lazy-eviction-on-read behavior; `cleanup_expired_
//! sessions` additionally supports active sweeps for periodic background
//! eviction per SPEC_FULL.md §4.13.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_TTL_SECS: i64 = 1800;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    pub domain: String,
    pub cookies: Vec<Cookie>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub ttl: i64,
}

#[derive(Clone, Debug)]
pub struct SessionSummary {
    pub domain: String,
    pub is_valid: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub ttl: i64,
}

pub struct SessionStore {
    sessions_dir: PathBuf,
}

fn sanitize_domain(domain: &str) -> String {
    domain.replace(['.', ':', '/'], "_")
}

impl SessionStore {
    pub fn open(sessions_dir: &Path) -> Result<Self, SessionError> {
        std::fs::create_dir_all(sessions_dir)?;
        Ok(Self { sessions_dir: sessions_dir.to_path_buf() })
    }

    pub fn open_default() -> Result<Self, SessionError> {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::open(&home.join(".soulbrowser").join("sessions"))
    }

    fn session_file(&self, domain: &str) -> PathBuf {
        self.sessions_dir.join(format!("{}.session.json", sanitize_domain(domain)))
    }

    pub fn save_session(
        &self,
        domain: &str,
        cookies: Vec<Cookie>,
        ttl: Option<i64>,
    ) -> Result<(), SessionError> {
        let ttl = ttl.unwrap_or(DEFAULT_TTL_SECS);
        let now = chrono::Utc::now();
        let record = SessionRecord {
            domain: domain.to_string(),
            cookies,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl),
            ttl,
        };
        let json = serde_json::to_vec_pretty(&record)?;
        std::fs::write(self.session_file(domain), json)?;
        tracing::debug!(target: "session_store", %domain, ttl, "session saved");
        Ok(())
    }

    /// Returns `None` if no session exists or it has expired; an expired
    /// session is deleted as a side effect (lazy eviction on read).
    pub fn get_session(&self, domain: &str) -> Result<Option<SessionRecord>, SessionError> {
        let path = self.session_file(domain);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read(&path)?;
        let record: SessionRecord = serde_json::from_slice(&raw)?;

        if chrono::Utc::now() > record.expires_at {
            self.clear_session(domain)?;
            tracing::debug!(target: "session_store", %domain, "expired session evicted on read");
            return Ok(None);
        }
        Ok(Some(record))
    }

    pub fn is_session_valid(&self, domain: &str) -> Result<bool, SessionError> {
        Ok(self.get_session(domain)?.is_some())
    }

    pub fn clear_session(&self, domain: &str) -> Result<bool, SessionError> {
        let path = self.session_file(domain);
        if path.exists() {
            std::fs::remove_file(path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn clear_all_sessions(&self) -> Result<(), SessionError> {
        for entry in self.iter_session_files()? {
            std::fs::remove_file(entry)?;
        }
        Ok(())
    }

    fn iter_session_files(&self) -> Result<Vec<PathBuf>, SessionError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.sessions_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false)
                && path.to_string_lossy().ends_with(".session.json")
            {
                files.push(path);
            }
        }
        Ok(files)
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>, SessionError> {
        let now = chrono::Utc::now();
        let mut summaries = Vec::new();
        for path in self.iter_session_files()? {
            let raw = std::fs::read(&path)?;
            let record: SessionRecord = serde_json::from_slice(&raw)?;
            summaries.push(SessionSummary {
                domain: record.domain,
                is_valid: now < record.expires_at,
                created_at: record.created_at,
                expires_at: record.expires_at,
                ttl: record.ttl,
            });
        }
        Ok(summaries)
    }

    /// Active sweep: removes every session past its TTL. Returns the count
    /// removed.
    pub fn cleanup_expired_sessions(&self) -> Result<usize, SessionError> {
        let now = chrono::Utc::now();
        let mut removed = 0;
        for path in self.iter_session_files()? {
            let raw = std::fs::read(&path)?;
            let record: SessionRecord = serde_json::from_slice(&raw)?;
            if now > record.expires_at {
                std::fs::remove_file(path)?;
                removed += 1;
            }
        }
        tracing::debug!(target: "session_store", removed, "expired session sweep complete");
        Ok(removed)
    }

    pub fn extend_session(&self, domain: &str, additional_ttl: i64) -> Result<bool, SessionError> {
        let Some(mut record) = self.get_session(domain)? else {
            return Ok(false);
        };
        record.expires_at = chrono::Utc::now() + chrono::Duration::seconds(additional_ttl);
        record.ttl = additional_ttl;
        let json = serde_json::to_vec_pretty(&record)?;
        std::fs::write(self.session_file(domain), json)?;
        Ok(true)
    }
}
