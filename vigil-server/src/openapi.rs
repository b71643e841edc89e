//! OpenAPI document for the vigil server.

use utoipa::OpenApi;

/// Aggregated OpenAPI description of every route.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::scan,
        crate::routes::openapi_json
    ),
    components(schemas(
        crate::routes::ScanRequest,
        crate::routes::HealthResponse,
        crate::routes::ErrorResponse,
        vigil_core::ScanReport,
        vigil_core::Finding,
        vigil_core::DetectorOutput,
        vigil_core::Severity,
        vigil_core::SeverityRecord,
        vigil_core::PatchSuggestion
    )),
    tags(
        (name = "system", description = "Health and metadata endpoints"),
        (name = "scan", description = "Vulnerability scanning endpoints")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_includes_expected_paths() {
        let doc = ApiDoc::openapi();
        for path in ["/health", "/scan", "/openapi.json"] {
            assert!(
                doc.paths.paths.contains_key(path),
                "missing path {path} in OpenAPI document"
            );
        }
    }

    #[test]
    fn openapi_includes_report_schema() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components present");
        assert!(components.schemas.contains_key("ScanReport"));
        assert!(components.schemas.contains_key("Finding"));
    }
}
