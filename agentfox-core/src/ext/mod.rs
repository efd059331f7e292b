//! Browser-side half of the bridge.
//!
//! The original design splits this across a privileged extension background
//! and a page-context content script; here both halves live in the host
//! process. [`background`] owns the native port to the relay and routes each
//! command either to browser APIs ([`browser_api`], [`chrome_data`],
//! [`netlog`]) or into the page ([`content`]).

pub mod background;
pub mod browser_api;
pub mod chrome_data;
pub mod content;
pub mod netlog;
pub mod port;
pub mod tabs;

pub use background::{ExtensionHost, HostConfig};
