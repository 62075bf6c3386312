//! Live tests against the Zadarma sandbox.
//!
//! These tests require ZADARMA_API_KEY and ZADARMA_API_SECRET for a sandbox
//! account in the environment.
//!
//! Run with: cargo test --features integ_test --test sandbox

#[cfg(feature = "integ_test")]
mod tests {
    use gatecall::zadarma::{Method, Params, ZadarmaClient};

    fn sandbox_client() -> Option<ZadarmaClient> {
        let key = std::env::var("ZADARMA_API_KEY").ok()?;
        let secret = std::env::var("ZADARMA_API_SECRET").ok()?;
        Some(ZadarmaClient::new(key, secret, true))
    }

    /// A signed read-only call the sandbox accepts only if our signature matches.
    #[tokio::test]
    async fn test_signed_balance_request() {
        let Some(client) = sandbox_client() else {
            eprintln!("Skipping test: sandbox credentials not set");
            return;
        };

        let response = client
            .call("/v1/info/balance/", Params::new(), Method::Get, "json", true)
            .await
            .expect("sandbox unreachable");

        println!("Sandbox replied {}: {}", response.status, response.body);
        assert_eq!(response.status, 200, "signature rejected: {}", response.body);

        let value: serde_json::Value = response.json().expect("JSON body");
        assert_eq!(value["status"], "success");
    }

    #[tokio::test]
    async fn test_wrong_secret_is_rejected() {
        let Ok(key) = std::env::var("ZADARMA_API_KEY") else {
            eprintln!("Skipping test: sandbox credentials not set");
            return;
        };
        let client = ZadarmaClient::new(key, "definitely-not-the-secret".to_string(), true);

        let response = client
            .call("/v1/info/balance/", Params::new(), Method::Get, "json", true)
            .await
            .expect("sandbox unreachable");

        assert_ne!(response.status, 200);
    }
}
