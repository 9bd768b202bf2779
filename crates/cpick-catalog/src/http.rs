use crate::html::{extract_directory_tags, extract_movie_detail};
use cpick_core::{
    film_url, CatalogClient, FetchError, MovieDetail, DEFAULT_DIRECTORY_URL,
    DEFAULT_FILM_BASE_URL,
};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpCatalogConfig {
    pub directory_url: String,
    pub film_base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpCatalogConfig {
    fn default() -> Self {
        Self {
            directory_url: DEFAULT_DIRECTORY_URL.to_string(),
            film_base_url: DEFAULT_FILM_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("cpick/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Blocking client for the Criterion Channel pages.
pub struct HttpCatalog {
    agent: ureq::Agent,
    config: HttpCatalogConfig,
}

impl HttpCatalog {
    pub fn new(config: HttpCatalogConfig) -> Self {
        let timeout = config.timeout.max(Duration::from_millis(100));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .user_agent(&config.user_agent)
            .build();
        Self { agent, config }
    }

    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!(url, "fetching page");
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|err| fetch_error_from_ureq(url, err))?;
        response.into_string().map_err(|err| FetchError::Http {
            url: url.to_string(),
            message: format!("failed to read body: {err}"),
        })
    }
}

impl CatalogClient for HttpCatalog {
    fn fetch_directory_html(&self) -> Result<String, FetchError> {
        self.get_text(&self.config.directory_url)
    }

    fn extract_tags(&self, directory_html: &str) -> Result<Vec<String>, FetchError> {
        extract_directory_tags(directory_html, &self.config.film_base_url)
    }

    fn fetch_movie_detail(&self, tag: &str) -> Result<MovieDetail, FetchError> {
        let url = film_url(&self.config.film_base_url, tag);
        let html = self.get_text(&url)?;
        extract_movie_detail(&html, &self.config.film_base_url)
    }
}

fn fetch_error_from_ureq(url: &str, err: ureq::Error) -> FetchError {
    match err {
        ureq::Error::Status(status, _) => FetchError::Status {
            url: url.to_string(),
            status,
        },
        ureq::Error::Transport(transport) => FetchError::Http {
            url: url.to_string(),
            message: format!("{:?}: {}", transport.kind(), transport),
        },
    }
}
