use std::sync::LazyLock;
use std::time::{Duration, Instant};

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use regex::bytes::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, CONTENT_TYPE};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::settings::Settings;

static META_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([A-Za-z0-9_\-:.]+)"#).unwrap()
});

/// How far into the body to look for a `<meta charset>` declaration.
const SNIFF_BYTES: usize = 2048;

pub struct FetchedPage {
    pub body: Vec<u8>,
    /// Charset from the Content-Type header, if the server sent one.
    pub charset: Option<String>,
}

/// Client with browser-like headers and the configured timeout.
pub fn build_client(settings: &Settings) -> reqwest::Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

    Client::builder()
        .default_headers(headers)
        .user_agent(settings.user_agent.as_str())
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
}

/// GET `url`. Non-2xx statuses and timeouts come back as errors.
pub async fn fetch_page(client: &Client, url: &str) -> reqwest::Result<FetchedPage> {
    let start = Instant::now();
    let response = client.get(url).send().await?.error_for_status()?;
    let charset = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(charset_from_content_type);
    let body = response.bytes().await?.to_vec();

    info!(
        bytes = body.len(),
        charset = charset.as_deref().unwrap_or("-"),
        latency_ms = start.elapsed().as_millis() as u64,
        "Fetched {}",
        url
    );
    Ok(FetchedPage { body, charset })
}

/// Decode the body using the header charset, then `<meta charset>`, then
/// whatever the bytes look like.
pub fn decode_body(page: &FetchedPage) -> String {
    let encoding = page
        .charset
        .as_deref()
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| sniff_meta_charset(&page.body))
        .unwrap_or_else(|| detect_charset(&page.body));

    let (text, used, had_errors) = encoding.decode(&page.body);
    if had_errors {
        warn!("Body had bytes invalid in {}; replaced", used.name());
    } else {
        debug!("Decoded body as {}", used.name());
    }
    text.into_owned()
}

fn charset_from_content_type(value: &str) -> Option<String> {
    value.split(';').find_map(|part| {
        let (key, val) = part.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(val.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

fn sniff_meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(SNIFF_BYTES)];
    let caps = META_CHARSET_RE.captures(head)?;
    Encoding::for_label(&caps[1])
}

/// Content-based guess for pages that declare no charset. Valid UTF-8 stays
/// UTF-8; legacy Chinese pages come back as GBK.
fn detect_charset(body: &[u8]) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    detector.feed(body, true);
    let guess = detector.guess(None, true);
    debug!("No declared charset, detected {}", guess.name());
    guess
}
