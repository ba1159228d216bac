//! Endpoint path builders for the Vertex AI prediction API.

use url::Url;

use crate::error::VertexResult;

/// Method suffix of the online prediction call.
pub const PREDICT: &str = ":predict";

/// Resource path of an endpoint.
///
/// # Example
///
/// ```
/// use integrations_vertex_ai::transport::endpoints;
///
/// let path = endpoints::endpoint("my-project", "us-central1", "123");
/// assert_eq!(path, "projects/my-project/locations/us-central1/endpoints/123");
/// ```
pub fn endpoint(project: &str, location: &str, endpoint_id: &str) -> String {
    format!("projects/{project}/locations/{location}/endpoints/{endpoint_id}")
}

/// Full URL of the `:predict` method for an endpoint path.
///
/// # Example
///
/// ```
/// use integrations_vertex_ai::transport::endpoints;
/// use url::Url;
///
/// let base = Url::parse("https://us-central1-aiplatform.googleapis.com").unwrap();
/// let url = endpoints::predict_url(&base, "v1", "projects/p/locations/us-central1/endpoints/1").unwrap();
/// assert_eq!(
///     url.as_str(),
///     "https://us-central1-aiplatform.googleapis.com/v1/projects/p/locations/us-central1/endpoints/1:predict"
/// );
/// ```
pub fn predict_url(base_url: &Url, api_version: &str, endpoint_path: &str) -> VertexResult<Url> {
    let base = base_url.as_str().trim_end_matches('/');
    Ok(Url::parse(&format!(
        "{base}/{api_version}/{endpoint_path}{PREDICT}"
    ))?)
}
