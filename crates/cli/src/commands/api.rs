//! Authenticated calls to the dashboard API

use anyhow::{Context, Result};
use clap::ValueEnum;
use shopdesk_infra::ApiError;

use crate::context::AppContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

/// Call `path` and print the JSON response
pub async fn call(
    ctx: &AppContext,
    method: HttpMethod,
    path: &str,
    data: Option<&str>,
) -> Result<()> {
    let api = ctx.api_client()?;

    let result = match method {
        HttpMethod::Get => api.get::<serde_json::Value>(path).await,
        HttpMethod::Post => {
            let body: serde_json::Value = match data {
                Some(raw) => serde_json::from_str(raw).context("--data is not valid JSON")?,
                None => serde_json::Value::Null,
            };
            api.post::<_, serde_json::Value>(path, &body).await
        }
        HttpMethod::Delete => api.delete(path).await.map(|()| serde_json::Value::Null),
    };

    match result {
        Ok(serde_json::Value::Null) => Ok(()),
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(err) if err.requires_login() => {
            Err(anyhow::Error::new(err).context("session is not valid; run `shopdesk refresh` or `shopdesk login`"))
        }
        Err(err @ ApiError::Forbidden { .. }) => {
            Err(anyhow::Error::new(err).context("the signed-in user may not access this resource"))
        }
        Err(err) => Err(err.into()),
    }
}
