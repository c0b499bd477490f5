use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::load_config;
use crate::error::{Error, Result};
use crate::page::{Page, parse_page};
use crate::query::{Escape, PAGE_SIZE, SearchQuery, encode_url};
use crate::table::Table;
use crate::transport::{HttpTransport, Transport};
use crate::util::{append_query, page_count};

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Portal root, e.g. `https://data.medicaid.gov`.
    pub url: String,
    /// Whether to verify TLS certificates.
    pub verify: bool,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Datastore search client for one DKAN portal.
#[derive(Debug, Clone)]
pub struct Client {
    url: String,
    escape: Escape,
    progress: bool,

    transport: Arc<dyn Transport>,
}

impl Client {
    /// Creates a client using environment variables and/or `.dkanapirc`.
    ///
    /// This is equivalent to `Client::new(None, None)`.
    pub fn from_env() -> Result<Self> {
        Self::new(None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `url`/`verify` arguments
    /// - environment variable `DKANAPI_URL`
    /// - config file from `DKANAPI_RC` or `.dkanapirc`
    /// - the default portal
    pub fn new(url: Option<String>, verify: Option<bool>) -> Result<Self> {
        let cfg = load_config(url, verify)?;
        Self::with_config(cfg)
    }

    pub fn with_config(cfg: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(cfg.timeout, cfg.verify)?;
        Ok(Self::with_transport(cfg.url, transport))
    }

    /// Creates a client that sends its requests through `transport`.
    pub fn with_transport(url: impl Into<String>, transport: impl Transport + 'static) -> Self {
        Self {
            url: url.into(),
            escape: Escape::default(),
            progress: true,
            transport: Arc::new(transport),
        }
    }

    pub fn with_escape(mut self, escape: Escape) -> Self {
        self.escape = escape;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The first-page URL `search` would request for `query`.
    pub fn search_url(&self, query: &SearchQuery) -> Result<String> {
        query.url(&self.url, self.escape)
    }

    /// Runs a datastore search and collects every requested record.
    ///
    /// Pages are fetched one after another. Without a maximum, all
    /// `ceil(total / limit)` pages are read. A maximum above [`PAGE_SIZE`] reads
    /// pages until `min(max, total)` records are collected and trims the last
    /// page; a maximum at or below it is served by the first page alone.
    pub fn search(&self, query: &SearchQuery) -> Result<Table> {
        let base_url = encode_url(&self.url, &query.pairs()?, self.escape);

        let first = self.fetch_page(&base_url, 0)?;
        debug!(total = first.total, limit = first.limit, "first page received");

        let Page {
            total,
            limit,
            columns,
            records,
        } = first;
        let mut table = Table::with_schema(columns, records.first());
        table.extend(records);

        let max = query.max_record_count();
        if let Some(max) = max.filter(|m| *m <= PAGE_SIZE) {
            table.truncate(to_usize(max));
            info!(rows = table.len(), pages = 1, "search complete");
            return Ok(table);
        }

        let target = max.map_or(total, |m| m.min(total));
        if limit == 0 && target > table.len() as u64 {
            return Err(Error::schema(
                &base_url,
                format!("portal reported a page limit of 0 with {} record(s) to fetch", target),
            ));
        }

        let pages = page_count(target, limit).max(1);
        let pb = self.progress_bar(pages, target, table.len());

        for page in 1..pages {
            let offset = page * limit;
            let url = append_query(&base_url, &[("offset", &offset.to_string())]);
            let next = self.fetch_page(&url, offset)?;
            table.extend(next.records);
            if let Some(pb) = &pb {
                pb.set_position(table.len() as u64);
            }
        }

        if max.is_some() {
            table.truncate(to_usize(target));
        }
        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }

        info!(rows = table.len(), pages, "search complete");
        Ok(table)
    }

    fn fetch_page(&self, url: &str, offset: u64) -> Result<Page> {
        debug!(url, offset, "requesting page");
        let body = self.transport.get_json(url)?;
        parse_page(url, body)
    }

    fn progress_bar(&self, pages: u64, target: u64, fetched: usize) -> Option<ProgressBar> {
        if !self.progress || pages <= 1 {
            return None;
        }
        let pb = ProgressBar::new(target);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.green} {pos}/{len} records {wide_bar} {eta}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb.set_position(fetched as u64);
        Some(pb)
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}
