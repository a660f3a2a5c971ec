use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes HTTP requests. Lets sources be tested without a network.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
