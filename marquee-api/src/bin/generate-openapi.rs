//! Prints the marquee OpenAPI document as JSON to stdout.
//!
//! Usage:
//!   cargo run -p marquee-api --bin generate-openapi > openapi.json

use marquee_api::ApiDoc;

fn main() {
    match ApiDoc::to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI spec: {}", e);
            std::process::exit(1);
        }
    }
}
