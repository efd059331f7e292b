//! Handlers for commands that run against browser APIs.
//!
//! Everything here executes over CDP on the active tab; the page's document
//! is never touched directly (that is the content layer's job).

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::GetCookiesParams;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, GetNavigationHistoryParams,
    HandleJavaScriptDialogParams, NavigateToHistoryEntryParams, PrintToPdfParams,
};
use chromiumoxide::Page;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::DispatchError;
use crate::protocol::{
    GetCookiesParams as CookieQuery, HandleDialogParams, NavigateParams, NetworkRequestsParams,
    NetworkVerb, ResizeParams, SavePdfParams, ScreenshotFormat, ScreenshotParams, TabsParams,
    TabsVerb,
};

use super::background::ExtensionHost;

/// How long navigation waits for the tab to reach a complete load state.
const NAV_TIMEOUT: Duration = Duration::from_secs(30);

/// Navigate the active tab and wait for the load to complete.
pub async fn navigate(
    host: &Arc<ExtensionHost>,
    params: NavigateParams,
) -> Result<Value, DispatchError> {
    let page = host.tabs.page().await.map_err(DispatchError::other)?;

    page.goto(&params.url)
        .await
        .map_err(|err| classify_nav_error(&page, err.to_string()))?;

    wait_for_load(host, &page).await?;
    page_identity(&page).await
}

/// Go back one history entry.
///
/// When there is no previous entry the handler returns the current identity
/// immediately rather than waiting for a navigation that will never happen.
pub async fn navigate_back(host: &Arc<ExtensionHost>) -> Result<Value, DispatchError> {
    let page = host.tabs.page().await.map_err(DispatchError::other)?;

    let history = page
        .execute(GetNavigationHistoryParams::default())
        .await
        .map_err(|err| classify_nav_error(&page, err.to_string()))?;

    let current = history.current_index;
    if current <= 0 {
        debug!("no history entry to go back to");
        return page_identity(&page).await;
    }

    let entry_id = history.entries[(current - 1) as usize].id;
    page.execute(NavigateToHistoryEntryParams::new(entry_id))
        .await
        .map_err(|err| classify_nav_error(&page, err.to_string()))?;

    // Brief probe: a same-document back completes without a load event.
    tokio::time::sleep(Duration::from_millis(150)).await;
    wait_for_load(host, &page).await?;
    page_identity(&page).await
}

async fn wait_for_load(host: &Arc<ExtensionHost>, page: &Page) -> Result<(), DispatchError> {
    match tokio::time::timeout(NAV_TIMEOUT, page.wait_for_navigation()).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(err)) => {
            let classified = classify_nav_error(page, err.to_string());
            if matches!(classified, DispatchError::TabClosed) {
                host.tabs.forget_page(page).await;
            }
            Err(classified)
        }
        Err(_) => {
            // Timed out: distinguish a closed tab from a slow page.
            if page.url().await.is_err() {
                host.tabs.forget_page(page).await;
                return Err(DispatchError::TabClosed);
            }
            Err(DispatchError::NavTimeout(NAV_TIMEOUT.as_secs()))
        }
    }
}

fn classify_nav_error(_page: &Page, message: String) -> DispatchError {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("closed") || lowered.contains("detached") || lowered.contains("no target") {
        DispatchError::TabClosed
    } else {
        DispatchError::Other(message)
    }
}

/// `{url, title}` of the active tab.
async fn page_identity(page: &Page) -> Result<Value, DispatchError> {
    let url = page
        .url()
        .await
        .map_err(DispatchError::other)?
        .unwrap_or_default();
    let title = page
        .get_title()
        .await
        .map_err(DispatchError::other)?
        .unwrap_or_default();
    Ok(json!({ "url": url, "title": title }))
}

/// Screenshot of the viewport, full page, or one referenced element.
pub async fn screenshot(
    host: &Arc<ExtensionHost>,
    params: ScreenshotParams,
) -> Result<Value, DispatchError> {
    let page = host.tabs.page().await.map_err(DispatchError::other)?;

    let (cdp_format, mime) = match params.format {
        ScreenshotFormat::Png => (CaptureScreenshotFormat::Png, "image/png"),
        ScreenshotFormat::Jpeg => (CaptureScreenshotFormat::Jpeg, "image/jpeg"),
    };

    let bytes = if let Some(ref ref_id) = params.r#ref {
        let selector = host.content.selector_for(ref_id)?;
        let element = match page.find_element(&selector).await {
            Ok(element) => element,
            Err(_) => {
                host.content.evict(ref_id);
                return Err(DispatchError::StaleRef(ref_id.clone()));
            }
        };
        element
            .screenshot(cdp_format)
            .await
            .map_err(DispatchError::other)?
    } else {
        let shot = CaptureScreenshotParams::builder()
            .format(cdp_format)
            .capture_beyond_viewport(params.full_page)
            .build();
        page.screenshot(shot).await.map_err(DispatchError::other)?
    };

    let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(json!({ "data": data, "mimeType": mime }))
}

/// Tab management: list, new, close, select.
pub async fn tabs(host: &Arc<ExtensionHost>, params: TabsParams) -> Result<Value, DispatchError> {
    match params.action {
        TabsVerb::List => {
            let tabs = host.tabs.list_tabs().await.map_err(DispatchError::other)?;
            Ok(json!({ "tabs": tabs }))
        }
        TabsVerb::New => {
            let (index, page) = host.tabs.new_tab().await.map_err(DispatchError::other)?;
            let identity = page_identity(&page).await?;
            Ok(json!({
                "index": index,
                "url": identity["url"],
                "title": identity["title"],
                "active": true,
            }))
        }
        TabsVerb::Close => {
            host.tabs
                .close_tab(params.index)
                .await
                .map_err(DispatchError::other)?;
            active_tab_info(host).await
        }
        TabsVerb::Select => {
            let index = params
                .index
                .ok_or_else(|| DispatchError::BadParams {
                    action: "tabs".into(),
                    detail: "select requires an index".into(),
                })?;
            let page = host
                .tabs
                .select_tab(index)
                .await
                .map_err(DispatchError::other)?;
            let identity = page_identity(&page).await?;
            Ok(json!({
                "index": index,
                "url": identity["url"],
                "title": identity["title"],
                "active": true,
            }))
        }
    }
}

async fn active_tab_info(host: &Arc<ExtensionHost>) -> Result<Value, DispatchError> {
    let tabs = host.tabs.list_tabs().await.map_err(DispatchError::other)?;
    let active = tabs.iter().find(|t| t.active);
    Ok(match active {
        Some(tab) => json!({
            "index": tab.index,
            "url": tab.url,
            "title": tab.title,
            "active": true,
        }),
        None => json!({}),
    })
}

/// Close the current tab.
pub async fn close_tab(host: &Arc<ExtensionHost>) -> Result<Value, DispatchError> {
    host.tabs
        .close_tab(None)
        .await
        .map_err(DispatchError::other)?;
    Ok(json!({}))
}

/// Resize the viewport via device-metrics override.
pub async fn resize(
    host: &Arc<ExtensionHost>,
    params: ResizeParams,
) -> Result<Value, DispatchError> {
    let page = host.tabs.page().await.map_err(DispatchError::other)?;
    page.execute(SetDeviceMetricsOverrideParams::new(
        params.width as i64,
        params.height as i64,
        0.0,
        false,
    ))
    .await
    .map_err(DispatchError::other)?;
    Ok(json!({}))
}

/// Export the page as a PDF next to the working directory.
pub async fn save_pdf(
    host: &Arc<ExtensionHost>,
    params: SavePdfParams,
) -> Result<Value, DispatchError> {
    let page = host.tabs.page().await.map_err(DispatchError::other)?;

    let mut builder = PrintToPdfParams::builder();
    if params.header_text.is_some() || params.footer_text.is_some() {
        builder = builder
            .display_header_footer(true)
            .header_template(template(params.header_text.as_deref()))
            .footer_template(template(params.footer_text.as_deref()));
    }

    let bytes = page.pdf(builder.build()).await.map_err(|err| {
        let message = err.to_string();
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("not implemented") || lowered.contains("not supported") {
            DispatchError::PdfUnsupported(message)
        } else {
            DispatchError::Other(message)
        }
    })?;

    let filename = format!(
        "agentfox-page-{}.pdf",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    );
    tokio::fs::write(&filename, &bytes)
        .await
        .map_err(DispatchError::other)?;

    Ok(json!({ "saved": filename, "status": "ok" }))
}

fn template(text: Option<&str>) -> String {
    match text {
        Some(text) => format!(
            "<span style=\"font-size:10px;width:100%;text-align:center\">{}</span>",
            html_escape(text)
        ),
        None => "<span></span>".to_string(),
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Accept or dismiss a blocking JavaScript dialog.
pub async fn handle_dialog(
    host: &Arc<ExtensionHost>,
    params: HandleDialogParams,
) -> Result<Value, DispatchError> {
    let page = host.tabs.page().await.map_err(DispatchError::other)?;

    let mut dialog = HandleJavaScriptDialogParams::new(params.accept);
    if let Some(ref text) = params.prompt_text {
        dialog.prompt_text = Some(text.clone());
    }

    page.execute(dialog).await.map_err(|err| {
        DispatchError::Other(format!(
            "Failed to handle dialog (is there an active dialog?): {}",
            err
        ))
    })?;

    Ok(json!({
        "status": if params.accept { "accepted" } else { "dismissed" },
    }))
}

/// Read cookies, optionally scoped to one URL.
pub async fn get_cookies(
    host: &Arc<ExtensionHost>,
    params: CookieQuery,
) -> Result<Value, DispatchError> {
    let page = host.tabs.page().await.map_err(DispatchError::other)?;

    let mut query = GetCookiesParams::default();
    if let Some(url) = params.url {
        query.urls = Some(vec![url]);
    }

    let cookies = page
        .execute(query)
        .await
        .map_err(DispatchError::other)?
        .result
        .cookies;
    let cookies = serde_json::to_value(&cookies).map_err(DispatchError::other)?;

    Ok(json!({ "cookies": cookies }))
}

/// Network request recording.
pub async fn network_requests(
    host: &Arc<ExtensionHost>,
    params: NetworkRequestsParams,
) -> Result<Value, DispatchError> {
    match params.action {
        NetworkVerb::Start => {
            let page = host.tabs.page().await.map_err(DispatchError::other)?;
            host.netlog.start(&page).await?;
            Ok(json!({ "recording": true }))
        }
        NetworkVerb::Stop => {
            host.netlog.stop().await;
            Ok(json!({ "recording": false }))
        }
        NetworkVerb::Get => {
            let requests = host.netlog.snapshot(params.filter.as_deref()).await;
            let count = requests.as_array().map(Vec::len).unwrap_or(0);
            Ok(json!({
                "requests": requests,
                "recording": host.netlog.is_recording().await,
                "count": count,
            }))
        }
        NetworkVerb::Clear => {
            let cleared = host.netlog.clear().await;
            Ok(json!({ "count": cleared }))
        }
    }
}
