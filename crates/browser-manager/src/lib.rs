//! Browser Manager (C1): a single explicit-lifecycle object owning the
//! browser process plus its named contexts and pages, shared across every
//! approach executor.
//!
//! The Browser Driver itself (launch/close/navigate/fill/click/...) is an
//! external collaborator — only the `BrowserDriver` trait contract is
//! specified here, the way `cdp-adapter` fronts the concrete CDP transport
//! behind a narrower trait in the teacher crate.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct BrowserSettings {
    pub headless: bool,
    pub viewport: (u32, u32),
    pub user_agent: Option<String>,
    pub timeout: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: (1280, 720),
            user_agent: None,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum BrowserManagerError {
    #[error("browser manager not initialized")]
    NotInitialized,
    #[error("driver error: {0}")]
    Driver(String),
}

/// Contract satisfied by whichever concrete browser driver is wired in
/// (e.g. a CDP adapter). Timeouts are expressed in milliseconds per
/// spec.md §6.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn launch(&self, settings: &BrowserSettings) -> Result<(), BrowserManagerError>;
    async fn close_browser(&self) -> Result<(), BrowserManagerError>;
    async fn create_context(&self, name: &str, settings: &BrowserSettings) -> Result<(), BrowserManagerError>;
    async fn close_context(&self, name: &str) -> Result<(), BrowserManagerError>;
    async fn create_page(&self, context_name: &str, page_name: &str) -> Result<(), BrowserManagerError>;
    async fn close_page(&self, context_name: &str, page_name: &str) -> Result<(), BrowserManagerError>;
}

#[derive(Clone, Debug)]
pub struct BrowserManagerInfo {
    pub settings: BrowserSettings,
    pub contexts: Vec<String>,
    pub pages: Vec<(String, String)>,
}

#[async_trait]
pub trait BrowserManager: Send + Sync {
    async fn initialize(&self, settings: BrowserSettings) -> Result<(), BrowserManagerError>;
    async fn get_context(&self, name: &str) -> Result<(), BrowserManagerError>;
    async fn get_page(&self, context_name: &str, page_name: &str) -> Result<(), BrowserManagerError>;
    async fn close_page(&self, context_name: &str, page_name: &str) -> Result<(), BrowserManagerError>;
    async fn close_context(&self, name: &str) -> Result<(), BrowserManagerError>;
    async fn close(&self) -> Result<(), BrowserManagerError>;
    fn info(&self) -> Result<BrowserManagerInfo, BrowserManagerError>;
}

/// Default manager: lazy-create contexts/pages keyed by name, guarded so
/// only one browser exists at a time. Initialization is idempotent unless
/// the headless flag changes, in which case the current browser is torn
/// down and replaced.
pub struct DefaultBrowserManager<D: BrowserDriver> {
    driver: Arc<D>,
    settings: Mutex<Option<BrowserSettings>>,
    init_lock: tokio::sync::Mutex<()>,
    contexts: DashMap<String, ()>,
    pages: DashMap<(String, String), ()>,
}

impl<D: BrowserDriver> DefaultBrowserManager<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self {
            driver,
            settings: Mutex::new(None),
            init_lock: tokio::sync::Mutex::new(()),
            contexts: DashMap::new(),
            pages: DashMap::new(),
        }
    }
}

#[async_trait]
impl<D: BrowserDriver> BrowserManager for DefaultBrowserManager<D> {
    async fn initialize(&self, settings: BrowserSettings) -> Result<(), BrowserManagerError> {
        let _guard = self.init_lock.lock().await;

        let headless_changed = {
            let current = self.settings.lock();
            match current.as_ref() {
                Some(existing) => existing.headless != settings.headless,
                None => false,
            }
        };

        if headless_changed {
            tracing::info!(target: "browser_manager", "headless flag changed, replacing browser");
            self.driver.close_browser().await?;
            self.contexts.clear();
            self.pages.clear();
        } else if self.settings.lock().is_some() {
            // Already initialized with compatible settings; idempotent no-op.
            return Ok(());
        }

        self.driver.launch(&settings).await?;
        *self.settings.lock() = Some(settings);
        Ok(())
    }

    async fn get_context(&self, name: &str) -> Result<(), BrowserManagerError> {
        if self.contexts.contains_key(name) {
            return Ok(());
        }
        let settings = self
            .settings
            .lock()
            .clone()
            .ok_or(BrowserManagerError::NotInitialized)?;
        self.driver.create_context(name, &settings).await?;
        self.contexts.insert(name.to_string(), ());
        Ok(())
    }

    async fn get_page(&self, context_name: &str, page_name: &str) -> Result<(), BrowserManagerError> {
        self.get_context(context_name).await?;
        let key = (context_name.to_string(), page_name.to_string());
        if self.pages.contains_key(&key) {
            return Ok(());
        }
        self.driver.create_page(context_name, page_name).await?;
        self.pages.insert(key, ());
        Ok(())
    }

    async fn close_page(&self, context_name: &str, page_name: &str) -> Result<(), BrowserManagerError> {
        let result = self.driver.close_page(context_name, page_name).await;
        self.pages
            .remove(&(context_name.to_string(), page_name.to_string()));
        result
    }

    async fn close_context(&self, name: &str) -> Result<(), BrowserManagerError> {
        self.pages.retain(|(ctx, _), _| ctx != name);
        let result = self.driver.close_context(name).await;
        self.contexts.remove(name);
        result
    }

    async fn close(&self) -> Result<(), BrowserManagerError> {
        // Every exit path releases resources even if the driver call fails.
        let result = self.driver.close_browser().await;
        self.pages.clear();
        self.contexts.clear();
        *self.settings.lock() = None;
        result
    }

    fn info(&self) -> Result<BrowserManagerInfo, BrowserManagerError> {
        let settings = self
            .settings
            .lock()
            .clone()
            .ok_or(BrowserManagerError::NotInitialized)?;
        Ok(BrowserManagerInfo {
            settings,
            contexts: self.contexts.iter().map(|e| e.key().clone()).collect(),
            pages: self.pages.iter().map(|e| e.key().clone()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingDriver {
        launches: AtomicU32,
        closes: AtomicU32,
    }

    #[async_trait]
    impl BrowserDriver for CountingDriver {
        async fn launch(&self, _settings: &BrowserSettings) -> Result<(), BrowserManagerError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn close_browser(&self) -> Result<(), BrowserManagerError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn create_context(&self, _name: &str, _settings: &BrowserSettings) -> Result<(), BrowserManagerError> {
            Ok(())
        }
        async fn close_context(&self, _name: &str) -> Result<(), BrowserManagerError> {
            Ok(())
        }
        async fn create_page(&self, _context_name: &str, _page_name: &str) -> Result<(), BrowserManagerError> {
            Ok(())
        }
        async fn close_page(&self, _context_name: &str, _page_name: &str) -> Result<(), BrowserManagerError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn initialize_is_idempotent_without_headless_change() {
        let driver = Arc::new(CountingDriver::default());
        let manager = DefaultBrowserManager::new(driver.clone());
        manager.initialize(BrowserSettings::default()).await.unwrap();
        manager.initialize(BrowserSettings::default()).await.unwrap();
        assert_eq!(driver.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn headless_flip_tears_down_and_relaunches() {
        let driver = Arc::new(CountingDriver::default());
        let manager = DefaultBrowserManager::new(driver.clone());
        manager.initialize(BrowserSettings::default()).await.unwrap();
        manager
            .initialize(BrowserSettings {
                headless: false,
                ..BrowserSettings::default()
            })
            .await
            .unwrap();
        assert_eq!(driver.launches.load(Ordering::SeqCst), 2);
        assert_eq!(driver.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pages_are_lazily_created_and_keyed_by_name() {
        let driver = Arc::new(CountingDriver::default());
        let manager = DefaultBrowserManager::new(driver);
        manager.initialize(BrowserSettings::default()).await.unwrap();
        manager.get_page("main", "home").await.unwrap();
        manager.get_page("main", "home").await.unwrap();
        let info = manager.info().unwrap();
        assert_eq!(info.pages.len(), 1);
        assert_eq!(info.contexts.len(), 1);
    }

    #[tokio::test]
    async fn close_releases_everything() {
        let driver = Arc::new(CountingDriver::default());
        let manager = DefaultBrowserManager::new(driver);
        manager.initialize(BrowserSettings::default()).await.unwrap();
        manager.get_page("main", "home").await.unwrap();
        manager.close().await.unwrap();
        assert!(manager.info().is_err());
    }
}
