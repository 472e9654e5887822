use splash_http::{Color, Orientation, SearchPhotosParams, SplashClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = SplashClient::from_env()?;

    let params = SearchPhotosParams::new("lighthouse")
        .per_page(5)
        .color(Color::Blue)
        .orientation(Orientation::Landscape);
    let results: serde_json::Value = client.search().photos(&params).await?;

    let total = results["total"].as_u64().unwrap_or_default();
    println!("{total} photo(s) found");
    for photo in results["results"].as_array().into_iter().flatten() {
        println!("{}  {}", photo["id"], photo["urls"]["small"]);
    }

    Ok(())
}
