use async_trait::async_trait;

use crate::traits::{FetchError, HttpResponse, HttpSession};

/// [`HttpSession`] backed by a real `reqwest::Client`.
pub struct ReqwestHttpSession {
    client: reqwest::Client,
}

impl ReqwestHttpSession {
    pub fn new(timeout: std::time::Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpSession for ReqwestHttpSession {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| FetchError(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| FetchError(err.to_string()))?
            .to_vec();
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_a_timeout() {
        ReqwestHttpSession::new(std::time::Duration::from_secs(5)).unwrap();
    }
}
