
use anyhow::{bail, Context};
use log::{debug, trace};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

use crate::data_types::call::Call;

/// Default root of the genomics REST service
pub const DEFAULT_API_ROOT: &str = "https://www.googleapis.com/genomics/v1beta2";
/// Default number of variants requested per page
pub const DEFAULT_PAGE_SIZE: usize = 1024;

/// How requests to the remote service are authenticated
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Credentials {
    /// Sent as the `key` query parameter
    ApiKey(String),
    /// Sent as a bearer token
    AccessToken(String)
}

impl Credentials {
    /// Picks the credential from the two mutually exclusive user options.
    /// # Errors
    /// * if neither or both are provided
    pub fn resolve(api_key: Option<&str>, access_token: Option<&str>) -> anyhow::Result<Credentials> {
        match (api_key, access_token) {
            (Some(key), None) => Ok(Credentials::ApiKey(key.to_string())),
            (None, Some(token)) => Ok(Credentials::AccessToken(token.to_string())),
            (None, None) => bail!("A remote call set requires one of --api-key or --access-token"),
            (Some(_), Some(_)) => bail!("Only one of --api-key or --access-token may be provided")
        }
    }
}

/// Everything needed to talk to the remote service
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Service root, without a trailing slash
    root_url: String,
    /// Authentication for every request
    credentials: Credentials,
    /// Optional per-request timeout
    timeout: Option<Duration>,
    /// Number of variants per page
    page_size: usize
}

impl ApiConfig {
    pub fn new(root_url: &str, credentials: Credentials, timeout: Option<Duration>, page_size: usize) -> Self {
        Self {
            root_url: root_url.trim_end_matches('/').to_string(),
            credentials,
            timeout,
            page_size
        }
    }

    /// The endpoint used for variant searches
    pub fn search_url(&self) -> String {
        format!("{}/variants/search", self.root_url)
    }

    // getters
    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

/// Body of a variant search request
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchVariantsRequest {
    pub call_set_ids: Vec<String>,
    pub page_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>
}

/// One page of a variant search
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchVariantsResponse {
    #[serde(default)]
    pub variants: Vec<ApiVariant>,
    /// Absent or empty on the last page
    #[serde(default)]
    pub next_page_token: Option<String>
}

/// A variant as returned by the service, with the calls for the requested call sets
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVariant {
    pub reference_name: String,
    /// 0-based; int64 fields may arrive as JSON strings
    #[serde(deserialize_with = "deserialize_int64")]
    pub start: u64,
    pub reference_bases: String,
    #[serde(default)]
    pub alternate_bases: Vec<String>,
    #[serde(default)]
    pub calls: Vec<ApiCall>
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCall {
    pub call_set_id: String,
    /// Allele indices, negative values are no-calls
    #[serde(default)]
    pub genotype: Vec<i64>
}

/// Accepts an unsigned integer encoded either as a JSON number or a JSON string
fn deserialize_int64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64Repr {
        Number(u64),
        Text(String)
    }

    match Int64Repr::deserialize(deserializer)? {
        Int64Repr::Number(value) => Ok(value),
        Int64Repr::Text(text) => text.parse::<u64>().map_err(serde::de::Error::custom)
    }
}

/// Fetches one page of search results.
/// Split out from the iterator so the paging logic does not depend on a live service.
pub trait PageFetcher {
    /// # Errors
    /// * on transport, status, or decoding failures
    fn fetch_page(&mut self, request: &SearchVariantsRequest) -> anyhow::Result<SearchVariantsResponse>;
}

/// Fetches pages over HTTP with a blocking client
pub struct HttpPageFetcher {
    client: reqwest::blocking::Client,
    url: reqwest::Url,
    credentials: Credentials
}

impl HttpPageFetcher {
    /// Builds the client and the search URL.
    /// # Errors
    /// * if the root URL does not parse or the client cannot be constructed
    pub fn new(api: &ApiConfig) -> anyhow::Result<Self> {
        let search_url = api.search_url();
        let url = match api.credentials() {
            Credentials::ApiKey(key) => reqwest::Url::parse_with_params(&search_url, &[("key", key.as_str())]),
            Credentials::AccessToken(_) => reqwest::Url::parse(&search_url)
        }.with_context(|| format!("Error while parsing API URL {search_url:?}:"))?;

        let mut client_builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = api.timeout() {
            client_builder = client_builder.timeout(timeout);
        }
        let client = client_builder.build()
            .context("Error while building HTTP client:")?;

        Ok(Self {
            client,
            url,
            credentials: api.credentials().clone()
        })
    }
}

impl PageFetcher for HttpPageFetcher {
    fn fetch_page(&mut self, request: &SearchVariantsRequest) -> anyhow::Result<SearchVariantsResponse> {
        let mut request_builder = self.client.post(self.url.clone()).json(request);
        if let Credentials::AccessToken(token) = &self.credentials {
            request_builder = request_builder.bearer_auth(token);
        }

        let response = request_builder.send()
            .with_context(|| format!("Error while sending search request to {}:", self.url.path()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("Search request to {} failed with status {status}: {body}", self.url.path());
        }

        let page: SearchVariantsResponse = response.json()
            .with_context(|| format!("Error while decoding search response from {}:", self.url.path()))?;
        Ok(page)
    }
}

/// Lazily pages through all calls of one remote call set.
/// A page is only requested once the previous one is drained, and dropping the iterator stops paging.
pub struct RemoteCallIterator<F: PageFetcher> {
    /// Source of pages
    fetcher: F,
    /// The call set we are pulling
    callset_id: String,
    /// Variants per page
    page_size: usize,
    /// Calls from the current page not yet handed out
    buffer: VecDeque<Call>,
    /// Token for the next page; None once the last page was fetched
    next_token: Option<String>,
    /// Number of pages requested so far
    pages_fetched: u64,
    /// Set once the stream ended or errored
    done: bool
}

impl<F: PageFetcher> RemoteCallIterator<F> {
    pub fn new(fetcher: F, callset_id: &str, page_size: usize) -> Self {
        Self {
            fetcher,
            callset_id: callset_id.to_string(),
            page_size,
            buffer: Default::default(),
            next_token: None,
            pages_fetched: 0,
            done: false
        }
    }

    /// Requests the next page and moves its calls into the buffer
    fn fetch_next_page(&mut self) -> anyhow::Result<()> {
        let request = SearchVariantsRequest {
            call_set_ids: vec![self.callset_id.clone()],
            page_size: self.page_size,
            page_token: self.next_token.take()
        };
        let page = self.fetcher.fetch_page(&request)
            .with_context(|| format!("Error while fetching page {} of call set {:?}:", self.pages_fetched + 1, self.callset_id))?;
        self.pages_fetched += 1;
        self.next_token = page.next_page_token.filter(|t| !t.is_empty());
        debug!(
            "Fetched page {} of call set {:?} with {} variants, more pages: {}",
            self.pages_fetched, self.callset_id, page.variants.len(), self.next_token.is_some()
        );

        for variant in page.variants.into_iter() {
            let alleles: Vec<String> = std::iter::once(variant.reference_bases)
                .chain(variant.alternate_bases)
                .collect();
            for api_call in variant.calls.iter().filter(|c| c.call_set_id == self.callset_id) {
                let genotype: Vec<usize> = api_call.genotype.iter()
                    .filter(|&&g| g >= 0)
                    .map(|&g| g as usize)
                    .collect();
                if genotype.is_empty() {
                    trace!("\tSkipping no-call at {}:{}", variant.reference_name, variant.start);
                    continue;
                }

                let call = Call::new(variant.reference_name.clone(), variant.start, alleles.clone(), genotype)
                    .with_context(|| format!("Error parsing call at {}:{} in call set {:?}:", variant.reference_name, variant.start, self.callset_id))?;
                self.buffer.push_back(call);
            }
        }
        Ok(())
    }

    // getters
    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }
}

impl<F: PageFetcher> Iterator for RemoteCallIterator<F> {
    type Item = anyhow::Result<Call>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if let Some(call) = self.buffer.pop_front() {
                return Some(Ok(call));
            }

            if self.pages_fetched > 0 && self.next_token.is_none() {
                self.done = true;
                return None;
            }

            if let Err(e) = self.fetch_next_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

/// Opens a lazy call stream for a remote call set
/// # Errors
/// * if the HTTP client cannot be constructed
pub fn open_remote_callset(api: &ApiConfig, callset_id: &str) -> anyhow::Result<RemoteCallIterator<HttpPageFetcher>> {
    let fetcher = HttpPageFetcher::new(api)?;
    debug!("Searching call set {callset_id:?} at {}", api.root_url());
    Ok(RemoteCallIterator::new(fetcher, callset_id, api.page_size()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serves canned pages keyed by the request token and records every request
    struct MockFetcher {
        pages: Vec<(Option<String>, anyhow::Result<SearchVariantsResponse>)>,
        requests: Vec<SearchVariantsRequest>
    }

    impl MockFetcher {
        fn new(pages: Vec<(Option<&str>, &str)>) -> Self {
            Self {
                pages: pages.into_iter()
                    .map(|(token, body)| (token.map(|t| t.to_string()), Ok(serde_json::from_str(body).unwrap())))
                    .collect(),
                requests: vec![]
            }
        }
    }

    impl PageFetcher for MockFetcher {
        fn fetch_page(&mut self, request: &SearchVariantsRequest) -> anyhow::Result<SearchVariantsResponse> {
            self.requests.push(request.clone());
            let index = self.pages.iter()
                .position(|(token, _)| *token == request.page_token)
                .ok_or(anyhow::anyhow!("unknown page token {:?}", request.page_token))?;
            self.pages.remove(index).1
        }
    }

    const PAGE_1: &str = r#"{
        "variants": [
            {"referenceName": "chr1", "start": "99", "referenceBases": "A", "alternateBases": ["T"],
             "calls": [{"callSetId": "cs1", "genotype": [0, 1]}, {"callSetId": "cs2", "genotype": [1, 1]}]},
            {"referenceName": "chr1", "start": 149, "referenceBases": "C",
             "calls": [{"callSetId": "cs1", "genotype": [-1, -1]}]}
        ],
        "nextPageToken": "p2"
    }"#;
    const PAGE_2: &str = r#"{"variants": [], "nextPageToken": "p3"}"#;
    const PAGE_3: &str = r#"{
        "variants": [
            {"referenceName": "chr2", "start": "5", "referenceBases": "AT", "alternateBases": ["A", "ATT"],
             "calls": [{"callSetId": "cs1", "genotype": [2, -1]}]}
        ],
        "nextPageToken": ""
    }"#;

    #[test]
    fn test_request_serialization() {
        let request = SearchVariantsRequest {
            call_set_ids: vec!["cs1".to_string()],
            page_size: 10,
            page_token: None
        };
        assert_eq!(serde_json::to_string(&request).unwrap(), r#"{"callSetIds":["cs1"],"pageSize":10}"#);
    }

    #[test]
    fn test_int64_decoding() {
        let variant: ApiVariant = serde_json::from_str(r#"{"referenceName": "chr1", "start": "12", "referenceBases": "A"}"#).unwrap();
        assert_eq!(variant.start, 12);
        let variant: ApiVariant = serde_json::from_str(r#"{"referenceName": "chr1", "start": 12, "referenceBases": "A"}"#).unwrap();
        assert_eq!(variant.start, 12);
        assert!(serde_json::from_str::<ApiVariant>(r#"{"referenceName": "chr1", "start": "x", "referenceBases": "A"}"#).is_err());
    }

    #[test]
    fn test_paging() {
        let fetcher = MockFetcher::new(vec![(None, PAGE_1), (Some("p2"), PAGE_2), (Some("p3"), PAGE_3)]);
        let mut iter = RemoteCallIterator::new(fetcher, "cs1", 2);
        let calls: Vec<Call> = iter.by_ref().collect::<anyhow::Result<_>>().unwrap();
        assert_eq!(calls, vec![
            Call::new("chr1".to_string(), 99, vec!["A".to_string(), "T".to_string()], vec![0, 1]).unwrap(),
            Call::new("chr2".to_string(), 5, vec!["AT".to_string(), "A".to_string(), "ATT".to_string()], vec![2]).unwrap()
        ]);
        assert_eq!(iter.pages_fetched(), 3);
        assert!(iter.fetcher.requests.iter().all(|r| r.call_set_ids == vec!["cs1".to_string()] && r.page_size == 2));
        assert_eq!(
            iter.fetcher.requests.iter().map(|r| r.page_token.clone()).collect::<Vec<_>>(),
            vec![None, Some("p2".to_string()), Some("p3".to_string())]
        );
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_lazy_paging() {
        let fetcher = MockFetcher::new(vec![(None, PAGE_1), (Some("p2"), PAGE_2), (Some("p3"), PAGE_3)]);
        let mut iter = RemoteCallIterator::new(fetcher, "cs1", 2);
        assert_eq!(iter.pages_fetched(), 0);
        assert!(iter.next().unwrap().is_ok());
        // the consumer stopped here, no further pages should be requested
        assert_eq!(iter.pages_fetched(), 1);
        assert_eq!(iter.fetcher.requests.len(), 1);
    }

    #[test]
    fn test_page_failure() {
        // the second page is never served
        let fetcher = MockFetcher::new(vec![(None, PAGE_1)]);
        let mut iter = RemoteCallIterator::new(fetcher, "cs1", 2);
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_credentials() {
        assert_eq!(Credentials::resolve(Some("k"), None).unwrap(), Credentials::ApiKey("k".to_string()));
        assert_eq!(Credentials::resolve(None, Some("t")).unwrap(), Credentials::AccessToken("t".to_string()));
        assert!(Credentials::resolve(None, None).is_err());
        assert!(Credentials::resolve(Some("k"), Some("t")).is_err());
    }

    #[test]
    fn test_search_url() {
        let api = ApiConfig::new("https://example.org/genomics/v1/", Credentials::ApiKey("k".to_string()), None, 16);
        assert_eq!(api.search_url(), "https://example.org/genomics/v1/variants/search");
        let fetcher = HttpPageFetcher::new(&api).unwrap();
        assert_eq!(fetcher.url.as_str(), "https://example.org/genomics/v1/variants/search?key=k");
    }
}
