//! Page script evaluation
//!
//! `ScriptHost` is the seam between the decision logic and the browser:
//! sessions, probes and the responder talk to a host, tests substitute a
//! canned one, and [`cdp`] provides the real DevTools-backed host.

pub mod cdp;

pub use cdp::BrowserHandle;

use serde_json::Value;
use std::future::Future;

use crate::Result;

/// Evaluates a JavaScript expression in a page and returns its JSON value.
///
/// Expressions that evaluate to `undefined` come back as `Value::Null`.
pub trait ScriptHost {
    fn eval_json(&self, expression: &str) -> impl Future<Output = Result<Value>> + Send;
}

/// The page's current location, read in-page so soft (history API)
/// navigations are observed too.
pub async fn current_url<H: ScriptHost>(host: &H) -> Result<String> {
    let value = host.eval_json("location.href").await?;
    Ok(value.as_str().unwrap_or_default().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticHost(Value);

    impl ScriptHost for StaticHost {
        async fn eval_json(&self, _expression: &str) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_current_url() {
        let host = StaticHost(Value::String("https://chatgpt.com/c/abc".to_string()));
        let url = current_url(&host).await.unwrap();
        assert_eq!(url, "https://chatgpt.com/c/abc");
    }

    #[tokio::test]
    async fn test_current_url_non_string_is_empty() {
        let host = StaticHost(Value::Null);
        let url = current_url(&host).await.unwrap();
        assert_eq!(url, "");
    }
}
