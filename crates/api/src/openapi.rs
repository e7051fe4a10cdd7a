//! OpenAPI Specification Configuration
//!
//! Generated from the request/response types and route handlers using utoipa.
//! The `/render` WebSocket is not an OpenAPI operation; its frames are
//! described in the API description below.

use crate::types::*;
use diagram_common::{ChatTurn, ConnectionId, GenerationOutcome, Role, ValidationStatus};

/// OpenAPI specification for the diagram API
#[derive(utoipa::OpenApi)]
#[openapi(
    info(
        title = "Diagram Generation API",
        description = "
Generates Mermaid diagrams from natural-language prompts and validates each
candidate by having the caller's browser render it, repairing failures with
the render error until the diagram renders or the retry budget runs out.

## Usage Pattern

1. Open a WebSocket to `/render`; the first frame is
   `{\"type\":\"connected\",\"connectionId\":\"...\"}`
2. POST `/generate` with the prompt and that `connectionId`
3. Answer every `{\"type\":\"validate\",\"correlationId\",\"diagramSource\"}` frame with
   `{\"type\":\"verdict\",\"correlationId\",\"success\",\"error\"}`
4. Optional `{\"type\":\"progress\",\"event\":{...}}` frames report loop progress

A render client that stays silent for the validation window (5 s by default)
is treated as a success; the response reports `validation: inconclusive`.
        ",
        version = "1.0.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    paths(
        crate::routes::generate::generate_diagram,
        crate::server::health_check
    ),
    components(schemas(
        GenerateRequest,
        HealthResponse,
        ErrorResponse,
        GenerationOutcome,
        ValidationStatus,
        ChatTurn,
        Role,
        ConnectionId
    )),
    tags(
        (name = "generation", description = "Render-validated diagram generation"),
        (name = "health", description = "System health and status")
    )
)]
pub struct ApiDoc;
