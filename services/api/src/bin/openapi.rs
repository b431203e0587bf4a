//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document for the REST API to disk.
//!
//! Usage: `openapi [OUTPUT]` (defaults to `openapi.json`).

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn write_document(
    api_doc: utoipa::openapi::OpenApi,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let operations: usize = api_doc
        .paths
        .paths
        .values()
        .map(|item| {
            [&item.get, &item.post, &item.put, &item.delete]
                .iter()
                .filter(|op| op.is_some())
                .count()
        })
        .sum();
    std::fs::write(path, api_doc.to_pretty_json()?)?;
    println!("Wrote {} operations to {}", operations, path);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    write_document(ApiDoc::openapi(), &path)
}
