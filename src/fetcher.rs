use std::error::Error as _;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use reqwest::blocking::{Client, Response};
use reqwest::header::USER_AGENT;
use reqwest::Proxy;
use tracing::{debug, warn};
use url::Url;

use crate::config::{FetchConfig, ParseOptions};
use crate::entry::{IndexEntry, PageEntry, RecordKind};
use crate::error::{self, SitemapError};
use crate::parser::SitemapParser;

/// Downloads sitemap documents and streams the body into the parser.
///
/// When a proxy pool is given, one proxy is picked at random per call. If the
/// proxied request times out, a single direct request is made instead; every
/// other failure is returned as is. The randomness source is injectable so
/// proxy choice can be made deterministic.
pub struct SitemapFetcher<G = StdRng> {
    config: FetchConfig,
    parser: SitemapParser,
    rng: Mutex<G>,
}

impl SitemapFetcher<StdRng> {
    /// Create a fetcher whose proxy choice is seeded from OS entropy
    pub fn new(config: FetchConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }
}

impl<G: rand::Rng> SitemapFetcher<G> {
    /// Create a fetcher with an explicit randomness source
    pub fn with_rng(config: FetchConfig, rng: G) -> Self {
        Self {
            config,
            parser: SitemapParser::default(),
            rng: Mutex::new(rng),
        }
    }

    /// Use `options` when materializing fetched records
    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.parser = SitemapParser::new(options);
        self
    }

    /// Get the fetch configuration
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Download the sitemap at `url` and hand each `<url>` record to `consumer`.
    pub fn fetch<F, E>(
        &self,
        url: &str,
        proxies: &[String],
        user_agent: &str,
        consumer: F,
    ) -> Result<(), E>
    where
        F: FnMut(PageEntry) -> Result<(), E>,
        E: From<SitemapError>,
    {
        let response = self.open(url, proxies, user_agent, RecordKind::Page)?;
        self.parser.parse(response, consumer)
    }

    /// Download the sitemap index at `url` and hand each `<sitemap>` record to `consumer`.
    pub fn fetch_index<F, E>(
        &self,
        url: &str,
        proxies: &[String],
        user_agent: &str,
        consumer: F,
    ) -> Result<(), E>
    where
        F: FnMut(IndexEntry) -> Result<(), E>,
        E: From<SitemapError>,
    {
        let response = self.open(url, proxies, user_agent, RecordKind::Index)?;
        self.parser.parse_index(response, consumer)
    }

    /// Obtain a successful response, falling back to a direct request when
    /// the proxied one times out.
    fn open(
        &self,
        url: &str,
        proxies: &[String],
        user_agent: &str,
        kind: RecordKind,
    ) -> error::Result<Response> {
        let Some(proxy) = self.select_proxy(proxies) else {
            return self.send_direct(url, user_agent);
        };

        let timeout_seconds = self.config.proxied_timeout_seconds(kind);
        debug!(url, proxy, timeout_seconds, "requesting through proxy");

        match self
            .build_client(Some(proxy), timeout_seconds)
            .and_then(|client| send(&client, url, user_agent, timeout_seconds))
        {
            Err(err) if err.is_timeout() => {
                warn!(url, proxy, "proxy request timed out, falling back to direct request");
                self.send_direct(url, user_agent)
            }
            other => other,
        }
    }

    fn send_direct(&self, url: &str, user_agent: &str) -> error::Result<Response> {
        let timeout_seconds = self.config.direct_timeout_seconds;
        debug!(url, timeout_seconds, "requesting directly");

        let client = self.build_client(None, timeout_seconds)?;
        send(&client, url, user_agent, timeout_seconds)
    }

    /// Pick one proxy uniformly at random, or `None` for an empty pool
    fn select_proxy<'p>(&self, proxies: &'p [String]) -> Option<&'p str> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        proxies.choose(&mut *rng).map(String::as_str)
    }

    fn build_client(&self, proxy: Option<&str>, timeout_seconds: u64) -> error::Result<Client> {
        let builder = Client::builder()
            .connect_timeout(self.config.tls_handshake_timeout())
            .timeout(Duration::from_secs(timeout_seconds))
            .danger_accept_invalid_certs(self.config.accept_invalid_certs);

        let builder = match proxy {
            Some(proxy) => {
                let proxy_url = Url::parse(proxy).map_err(|err| SitemapError::ProxyUrl {
                    proxy: proxy.to_string(),
                    details: err.to_string(),
                })?;
                let proxy_config =
                    Proxy::all(proxy_url.as_str()).map_err(|err| SitemapError::ProxyUrl {
                        proxy: proxy.to_string(),
                        details: err.to_string(),
                    })?;
                builder.proxy(proxy_config)
            }
            None => builder.no_proxy(),
        };

        Ok(builder.build()?)
    }
}

/// Issue the GET and check the status; the body is left unread.
fn send(
    client: &Client,
    url: &str,
    user_agent: &str,
    timeout_seconds: u64,
) -> error::Result<Response> {
    let response = client
        .get(url)
        .header(USER_AGENT, user_agent)
        .send()
        .map_err(|err| {
            if is_timeout_error(&err) {
                SitemapError::Timeout {
                    url: url.to_string(),
                    timeout_seconds,
                }
            } else {
                SitemapError::Network(err)
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(SitemapError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(response)
}

/// Timeouts reported by reqwest directly or wrapped as an I/O error further
/// down the source chain.
fn is_timeout_error(err: &reqwest::Error) -> bool {
    if err.is_timeout() {
        return true;
    }

    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        source = inner.source();
    }
    false
}
