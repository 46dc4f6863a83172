//! Example: Run a few request shapes against public endpoints
//!
//! Run with: cargo run -p httptask --example fetch_urls

use httptask::tasks::{self, Task, DEFAULT_PULLS_PROPERTY};
use httptask::{FetchEngine, GitPulls, HttpGet, Properties};

/// Example case definition
struct Case {
    description: &'static str,
    task: Box<dyn Task>,
    property: &'static str,
}

#[tokio::main]
async fn main() {
    println!("HttpTask Examples");
    println!("=================\n");

    let cases = vec![
        Case {
            description: "Query parameters",
            task: Box::new(HttpGet::new("https://httpbin.org/get").configure(|r| {
                r.param("q", "rust lang")
                    .dest_property("body")
                    .fail_on_error(false)
            })),
            property: "body",
        },
        Case {
            description: "Missing page reported, not fatal",
            task: Box::new(
                HttpGet::new("https://httpbin.org/status/404")
                    .configure(|r| r.fail_on_error(false)),
            ),
            property: "body",
        },
        Case {
            description: "GitHub pull request patch URLs",
            task: Box::new(
                GitPulls::new("rust-lang", "rust").configure(|r| r.fail_on_error(false)),
            ),
            property: DEFAULT_PULLS_PROPERTY,
        },
    ];

    for (i, case) in cases.iter().enumerate() {
        println!("{}. {}", i + 1, case.description);
        let mut properties = Properties::new();
        match tasks::run(case.task.as_ref(), FetchEngine::builder(), &mut properties).await {
            Ok(outcome) => {
                println!("   URL:       {}", outcome.url);
                println!("   Status:    {:?}", outcome.status_code);
                println!("   Succeeded: {}", outcome.succeeded);
                if let Some(reason) = &outcome.failure_reason {
                    println!("   Reason:    {}", reason);
                }
                if let Some(value) = properties.get(case.property) {
                    let preview: String = value.chars().take(120).collect();
                    println!("   {}: {}", case.property, preview);
                }
            }
            Err(e) => println!("   Error: {}", e),
        }
        println!();
    }
}
