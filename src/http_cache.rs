use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{env_bool, env_u64, opt_env};

const CACHE_VERSION: u32 = 1;
const CACHE_DIR: &str = "courtside";
const CACHE_FILE: &str = "http_cache.json";
const DEFAULT_TTL_SECS: u64 = 120;

static CACHE: Mutex<Option<CacheFile>> = Mutex::new(None);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheFile {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    body: String,
    etag: Option<String>,
    last_modified: Option<String>,
    fetched_at: i64,
}

impl CacheEntry {
    fn age_secs(&self, now: i64) -> u64 {
        (now - self.fetched_at).max(0) as u64
    }
}

/// GET with a small on-disk cache. Bodies younger than `HTTP_CACHE_TTL_SECS` are served
/// without a request; older ones are revalidated with ETag / Last-Modified.
/// `HTTP_CACHE=0` bypasses the cache entirely.
pub fn fetch_text_cached(client: &Client, url: &str) -> Result<String> {
    if !env_bool("HTTP_CACHE", true) {
        return fetch_plain(client, url);
    }

    let now = Utc::now().timestamp();
    let ttl = env_u64("HTTP_CACHE_TTL_SECS", DEFAULT_TTL_SECS);
    let cached = lock_cache().and_then(|mut guard| {
        let cache = guard.get_or_insert_with(load_cache_file);
        cache.entries.get(url).cloned()
    });
    if let Some(entry) = cached.as_ref()
        && entry.age_secs(now) < ttl
    {
        debug!(url, age = entry.age_secs(now), "http cache hit");
        return Ok(entry.body.clone());
    }

    let mut req = client.get(url);
    if let Some(entry) = cached.as_ref() {
        if let Some(etag) = entry.etag.as_ref() {
            req = req.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = entry.last_modified.as_ref() {
            req = req.header(IF_MODIFIED_SINCE, last_modified);
        }
    }

    let resp = req.send().with_context(|| format!("request failed: {url}"))?;
    let status = resp.status();
    let header = |name: HeaderName| {
        resp.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let etag = header(ETAG);
    let last_modified = header(LAST_MODIFIED);

    if status == StatusCode::NOT_MODIFIED {
        let Some(mut entry) = cached else {
            return Err(anyhow!("received 304 without a cached body for {url}"));
        };
        entry.fetched_at = now;
        let body = entry.body.clone();
        store_entry(url, entry);
        return Ok(body);
    }

    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow!("http {status} from {url}: {}", truncate(&body, 200)));
    }
    store_entry(
        url,
        CacheEntry {
            body: body.clone(),
            etag,
            last_modified,
            fetched_at: now,
        },
    );
    Ok(body)
}

fn fetch_plain(client: &Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .send()
        .with_context(|| format!("request failed: {url}"))?;
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow!("http {status} from {url}: {}", truncate(&body, 200)));
    }
    Ok(body)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// A poisoned lock only costs the cache, never the fetch.
fn lock_cache() -> Option<MutexGuard<'static, Option<CacheFile>>> {
    CACHE.lock().ok()
}

fn store_entry(url: &str, entry: CacheEntry) {
    let Some(mut guard) = lock_cache() else {
        return;
    };
    let cache = guard.get_or_insert_with(load_cache_file);
    cache.version = CACHE_VERSION;
    cache.entries.insert(url.to_string(), entry);
    if let Err(err) = save_cache_file(cache) {
        debug!(error = %err, "http cache not persisted");
    }
}

fn load_cache_file() -> CacheFile {
    let Some(raw) = cache_path().and_then(|p| fs::read_to_string(p).ok()) else {
        return CacheFile::default();
    };
    let cache = serde_json::from_str::<CacheFile>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return CacheFile::default();
    }
    cache
}

fn save_cache_file(cache: &CacheFile) -> Result<()> {
    let Some(path) = cache_path() else {
        return Ok(());
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).context("create http cache dir")?;
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(cache).context("serialize http cache")?;
    fs::write(&tmp, json).context("write http cache")?;
    fs::rename(&tmp, &path).context("swap http cache")?;
    Ok(())
}

fn cache_path() -> Option<PathBuf> {
    if let Some(base) = opt_env("XDG_CACHE_HOME") {
        return Some(PathBuf::from(base).join(CACHE_DIR).join(CACHE_FILE));
    }
    let home = opt_env("HOME")?;
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR).join(CACHE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("Đoković", 3), "Đok");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn age_never_negative() {
        let entry = CacheEntry {
            body: String::new(),
            etag: None,
            last_modified: None,
            fetched_at: 100,
        };
        assert_eq!(entry.age_secs(50), 0);
        assert_eq!(entry.age_secs(160), 60);
    }
}
