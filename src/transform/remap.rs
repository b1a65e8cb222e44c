//! Outbound path and method remapping.

use axum::http::uri::{PathAndQuery, Uri};
use axum::http::Method;

use crate::error::ForwardError;
use crate::http::message::{ProxyRequest, RoutingContext};
use crate::routing::template::PathTemplate;
use crate::transform::chain::RequestTransform;

/// Request extension marking a path that was rewritten by [`RemapPath`].
///
/// The transport sends a marked path as-is instead of prefixing the target's
/// base path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemappedPath;

/// Replaces the outbound request target with a rendered path template.
///
/// The rendered path replaces the whole target, so the inbound query string is
/// not carried over and the upstream's base path is not prepended.
/// Parameters come from the routing context.
#[derive(Debug, Clone)]
pub struct RemapPath {
    template: PathTemplate,
}

impl RemapPath {
    pub fn new(template: PathTemplate) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }
}

impl RequestTransform for RemapPath {
    fn transform_request(
        &self,
        ctx: &RoutingContext,
        mut req: ProxyRequest,
    ) -> Result<ProxyRequest, ForwardError> {
        let rendered = self.template.render(ctx)?;
        let rendered = if rendered.starts_with('/') {
            rendered
        } else {
            format!("/{rendered}")
        };

        let path_and_query = PathAndQuery::try_from(rendered.as_str())
            .map_err(|e| ForwardError::transform("remap_path", e.to_string()))?;
        let mut parts = req.uri().clone().into_parts();
        parts.path_and_query = Some(path_and_query);
        *req.uri_mut() = Uri::from_parts(parts)
            .map_err(|e| ForwardError::transform("remap_path", e.to_string()))?;
        req.extensions_mut().insert(RemappedPath);
        Ok(req)
    }
}

/// Forces the outbound method.
#[derive(Debug, Clone)]
pub struct OverrideMethod(pub Method);

impl RequestTransform for OverrideMethod {
    fn transform_request(
        &self,
        _ctx: &RoutingContext,
        mut req: ProxyRequest,
    ) -> Result<ProxyRequest, ForwardError> {
        *req.method_mut() = self.0.clone();
        Ok(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::Request;

    fn request(uri: &str) -> ProxyRequest {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header("x-keep", "1")
            .body(Bytes::from_static(b"payload"))
            .unwrap()
    }

    #[test]
    fn test_remap_renders_params_and_drops_query() {
        let remap = RemapPath::new(PathTemplate::parse("/v2/items/{id}").unwrap());
        let ctx = RoutingContext::new("items", Method::GET, "/items/42")
            .with_params(vec![("id".into(), "42".into())]);

        let out = remap.transform_request(&ctx, request("/items/42?verbose=1")).unwrap();
        assert_eq!(out.uri(), "/v2/items/42");
        assert_eq!(out.extensions().get::<RemappedPath>(), Some(&RemappedPath));
        assert_eq!(out.headers()["x-keep"], "1");
        assert_eq!(out.body(), &Bytes::from_static(b"payload"));
    }

    #[test]
    fn test_remap_missing_param_fails() {
        let remap = RemapPath::new(PathTemplate::parse("/items/{id}").unwrap());
        let ctx = RoutingContext::new("items", Method::GET, "/items");

        let err = remap.transform_request(&ctx, request("/items")).unwrap_err();
        assert!(matches!(err, ForwardError::MissingParameter { ref name } if name == "id"));
    }

    #[test]
    fn test_relative_template_gets_leading_slash() {
        let remap = RemapPath::new(PathTemplate::parse("status").unwrap());
        let ctx = RoutingContext::new("status", Method::GET, "/health");
        let out = remap.transform_request(&ctx, request("/health")).unwrap();
        assert_eq!(out.uri(), "/status");
    }

    #[test]
    fn test_override_method() {
        let ctx = RoutingContext::new("items", Method::GET, "/items");
        let out = OverrideMethod(Method::POST)
            .transform_request(&ctx, request("/items"))
            .unwrap();
        assert_eq!(*out.method(), Method::POST);
        assert_eq!(out.uri(), "/items");
        assert!(out.extensions().get::<RemappedPath>().is_none());
    }
}
