//! TabHost — CDP browser lifecycle with multi-tab support.
//!
//! Launches Chrome/Chromium (or connects to a running instance over CDP) and
//! tracks the open pages with an active-tab index. Only the active tab is
//! visible to commands; that mirrors the browser's own notion of "current
//! window".

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Configuration for the TabHost.
#[derive(Debug, Clone)]
pub struct TabHostConfig {
    /// Custom Chrome/Chromium binary path.
    pub browser_path: Option<String>,
    /// Connect to an already-running browser via CDP URL.
    pub cdp_url: Option<String>,
    /// Run headless (default: false — this bridge drives a real session).
    pub headless: bool,
    /// Browser window size.
    pub window_size: (u32, u32),
    /// Profile directory; also the source for bookmarks and history reads.
    pub user_data_dir: Option<PathBuf>,
}

impl Default for TabHostConfig {
    fn default() -> Self {
        Self {
            browser_path: None,
            cdp_url: None,
            headless: false,
            window_size: (1280, 720),
            user_data_dir: None,
        }
    }
}

/// Info about an open tab.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TabInfo {
    pub index: usize,
    pub url: String,
    pub title: String,
    pub active: bool,
}

/// Tracks all open tabs and which one is active.
#[derive(Default)]
struct TabState {
    pages: Vec<Page>,
    active_idx: usize,
}

/// Central browser lifecycle manager for the extension host.
pub struct TabHost {
    browser: RwLock<Option<Browser>>,
    state: RwLock<TabState>,
    config: TabHostConfig,
}

impl TabHost {
    pub fn new(config: TabHostConfig) -> Self {
        Self {
            browser: RwLock::new(None),
            state: RwLock::new(TabState::default()),
            config,
        }
    }

    /// Profile directory backing this session, when known.
    pub fn user_data_dir(&self) -> Option<&PathBuf> {
        self.config.user_data_dir.as_ref()
    }

    /// Ensure a browser is running, launching one if needed.
    pub async fn ensure_browser(&self) -> Result<()> {
        {
            let guard = self.browser.read().await;
            if guard.is_some() {
                return Ok(());
            }
        }

        let mut browser_guard = self.browser.write().await;
        if browser_guard.is_some() {
            return Ok(());
        }

        let browser = if let Some(ref cdp_url) = self.config.cdp_url {
            let (browser, mut handler) = Browser::connect(cdp_url)
                .await
                .with_context(|| format!("Failed to connect to browser at {}", cdp_url))?;

            tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            browser
        } else {
            let mut builder = BrowserConfig::builder();

            if let Some(ref path) = self.config.browser_path {
                builder = builder.chrome_executable(path);
            }

            if !self.config.headless {
                builder = builder.with_head();
            }

            builder = builder.window_size(self.config.window_size.0, self.config.window_size.1);

            if let Some(ref dir) = self.config.user_data_dir {
                builder = builder.user_data_dir(dir);
            }

            // Chrome args for stability and compatibility
            builder = builder
                .arg("--disable-dev-shm-usage")
                .arg("--remote-allow-origins=*");

            let config = builder.build().map_err(|e| anyhow::anyhow!("{}", e))?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .context("Failed to launch browser")?;

            tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            browser
        };

        *browser_guard = Some(browser);
        Ok(())
    }

    /// Get the active tab, creating one if none exist.
    pub async fn page(&self) -> Result<Page> {
        self.ensure_browser().await?;

        {
            let state = self.state.read().await;
            if !state.pages.is_empty() {
                let idx = state.active_idx.min(state.pages.len() - 1);
                return Ok(state.pages[idx].clone());
            }
        }

        let mut state = self.state.write().await;
        if !state.pages.is_empty() {
            let idx = state.active_idx.min(state.pages.len() - 1);
            return Ok(state.pages[idx].clone());
        }

        let browser_guard = self.browser.read().await;
        let browser = browser_guard.as_ref().context("Browser not initialized")?;

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to create new tab")?;

        state.pages.push(page.clone());
        state.active_idx = 0;
        Ok(page)
    }

    /// Open a new tab and make it active. Returns its index.
    pub async fn new_tab(&self) -> Result<(usize, Page)> {
        self.ensure_browser().await?;

        let browser_guard = self.browser.read().await;
        let browser = browser_guard.as_ref().context("Browser not initialized")?;

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to create new tab")?;

        let mut state = self.state.write().await;
        let idx = state.pages.len();
        state.pages.push(page.clone());
        state.active_idx = idx;
        Ok((idx, page))
    }

    /// List info about all open tabs.
    pub async fn list_tabs(&self) -> Result<Vec<TabInfo>> {
        self.ensure_browser().await?;

        let state = self.state.read().await;
        let mut infos = Vec::with_capacity(state.pages.len());

        for (i, page) in state.pages.iter().enumerate() {
            let url = page
                .url()
                .await
                .ok()
                .flatten()
                .unwrap_or_default()
                .to_string();
            let title = page.get_title().await.ok().flatten().unwrap_or_default();

            infos.push(TabInfo {
                index: i,
                url,
                title,
                active: i == state.active_idx,
            });
        }

        Ok(infos)
    }

    /// Switch the active tab by index.
    pub async fn select_tab(&self, idx: usize) -> Result<Page> {
        let mut state = self.state.write().await;
        if idx >= state.pages.len() {
            anyhow::bail!("Tab index {} out of range (have {} tabs)", idx, state.pages.len());
        }
        state.active_idx = idx;
        Ok(state.pages[idx].clone())
    }

    /// Close a tab by index (defaults to the active one). Cannot close the
    /// last tab.
    pub async fn close_tab(&self, idx: Option<usize>) -> Result<usize> {
        let mut state = self.state.write().await;
        let idx = idx.unwrap_or(state.active_idx);
        if idx >= state.pages.len() {
            anyhow::bail!("Tab index {} out of range (have {} tabs)", idx, state.pages.len());
        }
        if state.pages.len() == 1 {
            anyhow::bail!("Cannot close the last tab");
        }

        let page = state.pages.remove(idx);
        tokio::spawn(async move {
            use chromiumoxide::cdp::browser_protocol::page::CloseParams;
            let _ = page.execute(CloseParams::default()).await;
        });

        if state.active_idx >= state.pages.len() {
            state.active_idx = state.pages.len() - 1;
        }
        Ok(idx)
    }

    /// Forget a page that disappeared underneath us (tab closed by the user).
    pub async fn forget_page(&self, page: &Page) {
        let mut state = self.state.write().await;
        let target = page.target_id();
        state.pages.retain(|p| p.target_id() != target);
        if state.active_idx >= state.pages.len() && !state.pages.is_empty() {
            state.active_idx = state.pages.len() - 1;
        }
    }

    /// Close the browser process, if this host launched one.
    pub async fn shutdown(&self) {
        let mut guard = self.browser.write().await;
        if let Some(mut browser) = guard.take() {
            let _ = browser.close().await;
            let _ = browser.wait().await;
        }
    }
}
