//! Checks whether a self-hosted tracker script is reachable, the same way the loader does after
//! the script element reports an error.

use umami_rs_sdk::analytics::{probe_script_url, script_url};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = script_url(Some("https://analytics.umami.is"))?;
    let report = probe_script_url(&url).await?;

    println!("HEAD {url} -> {}", report.status);
    for (name, value) in &report.headers {
        println!("  {name}: {value}");
    }

    Ok(())
}
