use std::time::Duration;

use splash_http::{
    ApiKeyAuth, CancellationToken, ClientOptions, HttpRequest, RequestOptions, RetryPolicy,
    SplashClient, DEFAULT_BASE_URL,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let key = std::env::var("SPLASH_ACCESS_KEY")?;

    let client = SplashClient::builder(DEFAULT_BASE_URL)
        .header("Accept-Version", "v1")
        .auth(ApiKeyAuth::new("Authorization", format!("Client-ID {key}")))
        .options(
            ClientOptions::default()
                .with_timeout_ms(10_000)
                .with_retry(RetryPolicy::new(3).with_backoff(500, 4_000)),
        )
        .request_interceptor(|request: HttpRequest| -> splash_http::Result<HttpRequest> {
            println!("-> {} {} (attempt {})", request.method, request.url, request.attempt);
            Ok(request)
        })
        .build()?;

    let photos: Vec<serde_json::Value> = client.photos().random(3).await?;
    for photo in &photos {
        println!("{} by {}", photo["id"], photo["user"]["name"]);
    }

    // give up on a slow statistics call after two seconds
    let cancel = CancellationToken::new();
    let timer = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        timer.cancel();
    });
    if let Some(id) = photos.first().and_then(|photo| photo["id"].as_str()) {
        let stats: serde_json::Value = client
            .request_json(
                RequestOptions::new(format!("/photos/{id}/statistics")).cancel_token(cancel),
            )
            .await?;
        println!("downloads: {}", stats["downloads"]["total"]);
    }

    Ok(())
}
