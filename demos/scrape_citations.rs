use std::io::{BufRead, Write};
use std::sync::Arc;

use citation_scraper::{
    Checkpoint, ChromiumDriver, PageDriver, PaginationController, ScraperConfig,
};

/// Block until the operator confirms an authenticated session is active
/// in the opened browser window.
fn wait_for_login() {
    let stdin = std::io::stdin();
    loop {
        print!("Are you logged in yet? (y/n): ");
        std::io::stdout().flush().ok();

        let mut answer = String::new();
        if stdin.lock().read_line(&mut answer).is_err() {
            continue;
        }
        if answer.trim().eq_ignore_ascii_case("y") {
            return;
        }
        println!("Waiting for user to log in...");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,citation_scraper=debug".into()),
        )
        .init();

    // Optional resume position: RESUME_OFFICER / RESUME_SEQUENCE
    let checkpoint = match (
        std::env::var("RESUME_OFFICER").ok(),
        std::env::var("RESUME_SEQUENCE").ok(),
    ) {
        (Some(officer), Some(sequence)) => Checkpoint::resume_at(
            officer.parse().expect("RESUME_OFFICER must be an integer"),
            sequence.parse().expect("RESUME_SEQUENCE must be an integer"),
        ),
        _ => Checkpoint::default(),
    };

    // Login is interactive, so the browser must be visible
    let config = ScraperConfig::default()
        .with_headless(false)
        .with_checkpoint(checkpoint);

    let driver = Arc::new(
        ChromiumDriver::launch(&config)
            .await
            .expect("Failed to launch browser"),
    );

    // Show the operator the login page before gating on the prompt
    if let Err(e) = driver.navigate(&config.url).await {
        eprintln!("Failed to open {}: {}", config.url, e);
        return;
    }

    wait_for_login();

    let mut controller =
        PaginationController::new(driver, config).expect("Failed to open output store");

    match controller.run().await {
        Ok(summary) => {
            println!(
                "Done: {} records written across {} keys ({} retries).",
                summary.records_written, summary.keys_visited, summary.retries
            );
        }
        Err(e) => {
            eprintln!("Scrape aborted: {}", e);
        }
    }
}
