//! Runs the same initialization code a browser page would run, outside of a browser.
//! Without a document the loader skips injection, and `track` only warns because the
//! instance never left the uninitialized state.

use serde_json::json;
use umami_rs_sdk::analytics::{InitializeOutcome, Umami, UmamiOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = UmamiOptions::from_json(
        r#"{
            "websiteId": "94db1cb1-74f4-4a40-ad6c-962362670409",
            "hostUrl": "https://stats.example.com",
            "domains": ["example.com", "www.example.com"],
            "debug": true
        }"#,
    )?;

    let umami = Umami::new();
    match umami.initialize(options)? {
        InitializeOutcome::SkippedServerSide => println!("No document: nothing injected"),
        other => println!("Initialize outcome: {other:?}"),
    }

    umami.track("signup", json!({ "plan": "pro" }).as_object().cloned());
    println!("Loader state: {:?}", umami.state());

    Ok(())
}
