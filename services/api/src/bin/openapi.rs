//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the prayer reminder REST API, so the Mini App
//! client can be generated without running the service.
//!
//! Usage: `openapi [output-path]` (defaults to `openapi.json`).

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());

    let spec_json = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&path, spec_json)?;
    println!("OpenAPI document for {} routes written to {}", ApiDoc::openapi().paths.paths.len(), path);
    Ok(())
}
