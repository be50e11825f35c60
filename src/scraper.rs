use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::error::ApiError;
use crate::models::{self, Product};

const SCRAPE_TTL: Duration = Duration::from_secs(10 * 60);
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const SCRAPE_UA: &str = "Mozilla/5.0 (compatible; storefront-import/0.1)";

struct CacheEntry {
    product: Product,
    expires: Instant,
}

/// Time-bounded memo from source URL to the product last computed for it.
/// Keys are the literal URL string, so `…/x` and `…/x/` are distinct.
/// Expired entries are evicted lazily on lookup; there is no capacity
/// bound and no background sweep.
pub struct ScrapeCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ScrapeCache {
    pub fn new() -> Self {
        Self::with_ttl(SCRAPE_TTL)
    }

    fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, url: &str) -> Option<Product> {
        let mut entries = self.entries.lock().expect("scrape cache lock poisoned");
        match entries.get(url) {
            Some(entry) if Instant::now() < entry.expires => Some(entry.product.clone()),
            Some(_) => {
                entries.remove(url);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, url: &str, product: Product) {
        let entry = CacheEntry {
            product,
            expires: Instant::now() + self.ttl,
        };
        self.entries
            .lock()
            .expect("scrape cache lock poisoned")
            .insert(url.to_string(), entry);
    }
}

pub struct Scraper {
    http: reqwest::Client,
    cache: ScrapeCache,
}

impl Scraper {
    pub fn new() -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .user_agent(SCRAPE_UA)
            .redirect(reqwest::redirect::Policy::limited(8))
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            cache: ScrapeCache::new(),
        })
    }

    /// Best-effort product guess for `url`. A cache hit within the TTL
    /// returns without touching the network; a fresh result overwrites
    /// the entry with a new expiry.
    pub async fn scrape(&self, url: &str) -> Result<Product, ApiError> {
        if let Some(hit) = self.cache.get(url) {
            return Ok(hit);
        }

        Url::parse(url).map_err(|e| ApiError::Fetch(format!("invalid url: {e}")))?;

        let rsp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::Fetch(e.to_string()))?;
        let status = rsp.status();
        if !status.is_success() {
            return Err(ApiError::Fetch(format!("fetch failed {status}")));
        }
        let html = rsp
            .text()
            .await
            .map_err(|e| ApiError::Parse(format!("failed to read body: {e}")))?;

        let product = extract_product(&html, url);
        self.cache.insert(url, product.clone());
        Ok(product)
    }
}

// -------------------------
// Field extraction
// -------------------------

type Extractor = fn(&Html) -> Option<String>;

// Per-field strategies in priority order; the first to yield a value wins.
const TITLE_STRATEGIES: &[Extractor] = &[og_title, meta_title, title_element];
const IMAGE_STRATEGIES: &[Extractor] = &[og_image, first_img_src];
const PRICE_STRATEGIES: &[Extractor] = &[price_meta, price_class];

/// Turn a fetched page into a transient product. A field no strategy can
/// recover is not an error; it takes its documented default ("Produkt",
/// empty string, 0.0).
pub fn extract_product(html: &str, link: &str) -> Product {
    let doc = Html::parse_document(html);

    let name = first_match(&doc, TITLE_STRATEGIES)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Produkt".to_string());

    let image = first_match(&doc, IMAGE_STRATEGIES)
        .map(absolutize)
        .unwrap_or_default();

    let price = first_match(&doc, PRICE_STRATEGIES)
        .or_else(|| price_regex_scan(html))
        .map(|raw| normalize_price(&raw))
        .unwrap_or(0.0);

    Product {
        id: None,
        name,
        price,
        image,
        link: link.to_string(),
        category: models::default_category(),
        created_at: None,
        scraped_at: Some(models::now_rfc3339()),
    }
}

fn first_match(doc: &Html, strategies: &[Extractor]) -> Option<String> {
    strategies.iter().find_map(|extract| extract(doc))
}

fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).unwrap();
    doc.select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

fn og_title(doc: &Html) -> Option<String> {
    meta_content(doc, r#"meta[property="og:title"]"#)
}

fn meta_title(doc: &Html) -> Option<String> {
    meta_content(doc, r#"meta[name="title"]"#)
}

fn title_element(doc: &Html) -> Option<String> {
    let sel = Selector::parse("title").unwrap();
    doc.select(&sel)
        .next()
        .map(|el| el.text().collect::<String>())
        .filter(|s| !s.is_empty())
}

fn og_image(doc: &Html) -> Option<String> {
    meta_content(doc, r#"meta[property="og:image"]"#)
}

fn first_img_src(doc: &Html) -> Option<String> {
    let sel = Selector::parse("img").unwrap();
    doc.select(&sel)
        .next()
        .and_then(|el| el.value().attr("src"))
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

fn price_meta(doc: &Html) -> Option<String> {
    const PRICE_META_SELECTORS: &[&str] = &[
        r#"meta[itemprop="price"]"#,
        r#"meta[property="product:price:amount"]"#,
        r#"meta[name="price"]"#,
    ];
    PRICE_META_SELECTORS
        .iter()
        .find_map(|sel| meta_content(doc, sel))
}

fn price_class(doc: &Html) -> Option<String> {
    let sel = Selector::parse(r#"[class*="price"]"#).unwrap();
    doc.select(&sel)
        .next()
        .map(|el| el.text().collect::<String>())
        .filter(|s| !s.is_empty())
}

static PRICE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:€|\$)?\s*([0-9]{1,3}(?:[.,][0-9]{2})?)").expect("price pattern")
});

// Last resort: scan the raw markup for a currency-prefixed number.
fn price_regex_scan(html: &str) -> Option<String> {
    PRICE_PATTERN
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Keep only `[0-9,.-]`, swap at most one comma for a period, parse.
/// Unparseable, non-finite and negative results count as unrecoverable
/// and become 0.0. Lossy for thousands-separator formats ("1.299,99").
pub fn normalize_price(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    let cleaned = cleaned.replacen(',', ".", 1);
    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => models::round2(n),
        _ => 0.0,
    }
}

// Protocol-relative sources get an explicit secure scheme.
fn absolutize(src: String) -> String {
    match src.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => src,
    }
}
