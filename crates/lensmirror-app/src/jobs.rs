//! Background work requested by apps (outbound HTTP)

use std::time::Duration;

use lensmirror_core::prelude::*;

/// Work an app asks the engine to run off the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    HttpGet { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub reason: String,
    pub content_type: String,
    pub body: String,
}

impl HttpReply {
    /// `"200 OK"`
    pub fn status_line(&self) -> String {
        if self.reason.is_empty() {
            self.status.to_string()
        } else {
            format!("{} {}", self.status, self.reason)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub job: Job,
    pub outcome: std::result::Result<HttpReply, String>,
}

/// HTTP client used for jobs, with a per-request timeout.
pub fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!("Failed to build HTTP client with timeout: {}", e);
            reqwest::Client::new()
        })
}

pub async fn run_job(client: &reqwest::Client, job: Job) -> JobResult {
    let outcome = match &job {
        Job::HttpGet { url } => http_get(client, url).await.map_err(|e| e.to_string()),
    };
    JobResult { job, outcome }
}

async fn http_get(client: &reqwest::Client, raw_url: &str) -> Result<HttpReply> {
    let url = url::Url::parse(raw_url)
        .map_err(|e| Error::request(format!("invalid URL '{}': {}", raw_url, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::request(format!("unsupported scheme '{}'", url.scheme())));
    }

    debug!("GET {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::request(e.to_string()))?;

    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = response
        .text()
        .await
        .map_err(|e| Error::request(e.to_string()))?;

    Ok(HttpReply {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
        content_type,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line() {
        let reply = HttpReply {
            status: 404,
            reason: "Not Found".into(),
            content_type: String::new(),
            body: String::new(),
        };
        assert_eq!(reply.status_line(), "404 Not Found");
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_io() {
        let client = http_client(Duration::from_millis(100));
        let result = run_job(
            &client,
            Job::HttpGet {
                url: "not a url".into(),
            },
        )
        .await;
        assert!(result.outcome.unwrap_err().contains("invalid URL"));
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let client = http_client(Duration::from_millis(100));
        let result = run_job(
            &client,
            Job::HttpGet {
                url: "ftp://host/file".into(),
            },
        )
        .await;
        assert!(result.outcome.unwrap_err().contains("unsupported scheme"));
    }
}
