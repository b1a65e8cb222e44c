//! Compilation of validated configuration into a route table.
//!
//! Resolution (`RouteBlueprint::resolve`) is pure and is shared with
//! validation; only `compile_routes` touches the client registry.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{HeaderName, HeaderValue};
use axum::http::Method;

use crate::config::schema::{
    GatewayConfig, HeaderFilterConfig, RouteConfig, TranslationConfig, UpstreamConfig,
};
use crate::config::validation::ValidationError;
use crate::error::{BuildError, DispatchErrorKind};
use crate::http::headers::HeaderFilter;
use crate::http::status::StatusRemapper;
use crate::routing::matcher::{HeaderMatcher, HostMatcher, MethodMatcher, QueryParamMatcher};
use crate::routing::router::{Route, RoutePattern, RouteTable};
use crate::routing::template::PathTemplate;
use crate::upstream::{
    ClientRegistry, Endpoint, ExceptionTranslator, Scheme, Target, TransportOptions, Upstream,
    UpstreamBuilder,
};

/// Transport options derived from the configuration.
pub fn transport_options(config: &GatewayConfig) -> TransportOptions {
    TransportOptions {
        connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
        request_timeout: Duration::from_secs(config.timeouts.request_secs),
        max_response_body: config.listener.max_response_body_size,
    }
}

/// Default translator extended with the configured entries.
pub fn translator(config: &TranslationConfig) -> Result<ExceptionTranslator, Vec<ValidationError>> {
    let entries = [
        (DispatchErrorKind::UnknownHost, &config.unknown_host),
        (DispatchErrorKind::ConnectionRefused, &config.connection_refused),
        (DispatchErrorKind::NoHealthyEndpoint, &config.no_healthy_endpoint),
        (DispatchErrorKind::Timeout, &config.timeout),
        (DispatchErrorKind::Transport, &config.transport),
    ];

    let mut translator = ExceptionTranslator::default();
    let mut errors = Vec::new();
    for (kind, spec) in entries {
        let Some(spec) = spec else { continue };
        match spec.resolve() {
            Ok(status) => translator = translator.with(kind, status),
            Err(e) => errors.push(ValidationError::new(format!("translation.{kind}"), e)),
        }
    }

    if errors.is_empty() {
        Ok(translator)
    } else {
        Err(errors)
    }
}

/// Everything a route needs except its client.
pub struct RouteBlueprint {
    name: String,
    priority: i32,
    pattern: RoutePattern,
    methods: Option<MethodMatcher>,
    host: Option<HostMatcher>,
    headers: Vec<HeaderMatcher>,
    query: Vec<QueryParamMatcher>,
    upstream: UpstreamBuilder,
}

impl RouteBlueprint {
    /// Resolve one route, collecting every problem found.
    pub fn resolve(config: &RouteConfig) -> Result<Self, Vec<ValidationError>> {
        let mut errors = Errors::new(format!("routes.{}", config.name));

        if config.name.trim().is_empty() {
            errors.push("name", "route name should not be empty");
        }

        let pattern = match (&config.path, &config.path_prefix) {
            (Some(path), None) => errors
                .check("path", PathTemplate::parse(path).map_err(BuildError::from))
                .map(RoutePattern::Template),
            (None, Some(prefix)) => Some(RoutePattern::Prefix(prefix.clone())),
            _ => {
                errors.push("path", "exactly one of path or path_prefix is required");
                None
            }
        };

        let methods = if config.methods.is_empty() {
            None
        } else {
            let parsed: Vec<Method> = config
                .methods
                .iter()
                .filter_map(|m| errors.check("methods", parse_method(m)))
                .collect();
            Some(MethodMatcher::new(parsed))
        };

        let headers: Vec<HeaderMatcher> = config
            .headers
            .iter()
            .filter_map(|p| {
                let name = errors.check("headers", parse_header_name(&p.name))?;
                match &p.value {
                    None => Some(HeaderMatcher::present(name)),
                    Some(value) => HeaderValue::from_str(value)
                        .map(|value| HeaderMatcher::equals(name, value))
                        .map_err(|e| errors.push("headers", e))
                        .ok(),
                }
            })
            .collect();

        let query: Vec<QueryParamMatcher> = config
            .query
            .iter()
            .map(|p| match &p.value {
                None => QueryParamMatcher::present(&p.name),
                Some(value) => QueryParamMatcher::equals(&p.name, value),
            })
            .collect();

        let target = errors.check("upstream", resolve_target(&config.upstream));
        let upstream = target.map(|target| build_chain(config, Upstream::builder(target), &mut errors));

        let blueprint = match (pattern, upstream) {
            (Some(pattern), Some(Some(upstream))) => Some(Self {
                name: config.name.clone(),
                priority: config.priority,
                pattern,
                methods,
                host: config.host.as_deref().map(HostMatcher::new),
                headers,
                query,
                upstream,
            }),
            _ => None,
        };

        match blueprint {
            Some(blueprint) if errors.is_empty() => Ok(blueprint),
            _ => Err(errors.into_inner()),
        }
    }

    /// Bind the route to its client and translator.
    pub fn build(self, registry: &ClientRegistry, translator: &ExceptionTranslator) -> Route {
        let upstream = self.upstream.translator(translator.clone()).build(registry);
        let mut route = Route::new(self.name, self.pattern, Arc::new(upstream)).with_priority(self.priority);
        if let Some(methods) = self.methods {
            route = route.with_condition(methods);
        }
        if let Some(host) = self.host {
            route = route.with_condition(host);
        }
        for header in self.headers {
            route = route.with_condition(header);
        }
        for query in self.query {
            route = route.with_condition(query);
        }
        route
    }
}

/// Compile every route of `config` against `registry`.
pub fn compile_routes(
    config: &GatewayConfig,
    registry: &ClientRegistry,
) -> Result<RouteTable, Vec<ValidationError>> {
    let translator = translator(&config.translation);
    let mut errors = Vec::new();
    let mut blueprints = Vec::with_capacity(config.routes.len());
    for route in &config.routes {
        match RouteBlueprint::resolve(route) {
            Ok(blueprint) => blueprints.push(blueprint),
            Err(mut route_errors) => errors.append(&mut route_errors),
        }
    }

    let translator = match translator {
        Ok(translator) if errors.is_empty() => translator,
        Ok(_) => return Err(errors),
        Err(mut translation_errors) => {
            translation_errors.append(&mut errors);
            return Err(translation_errors);
        }
    };

    let routes = blueprints
        .into_iter()
        .map(|blueprint| blueprint.build(registry, &translator))
        .collect();
    Ok(RouteTable::new(routes))
}

fn resolve_target(config: &UpstreamConfig) -> Result<Target, BuildError> {
    let invalid = |reason: &str| BuildError::InvalidTarget {
        target: config.uri.clone().unwrap_or_default(),
        reason: reason.to_string(),
    };

    match (&config.uri, config.endpoints.is_empty()) {
        (Some(_), false) => Err(invalid("uri and endpoints are mutually exclusive")),
        (Some(_), true) if config.scheme.is_some() || config.path.is_some() => {
            Err(invalid("scheme and path only apply to endpoints"))
        }
        (Some(uri), true) => Target::from_uri(uri),
        (None, false) => {
            let scheme = config
                .scheme
                .as_deref()
                .ok_or_else(|| invalid("endpoints require a scheme"))
                .and_then(Scheme::parse)?;
            let endpoints = config
                .endpoints
                .iter()
                .map(|e| Endpoint::parse(e, scheme))
                .collect::<Result<Vec<_>, _>>()?;
            Target::from_endpoints(scheme, endpoints, config.path.as_deref().unwrap_or(""))
        }
        (None, true) => Err(invalid("one of uri or endpoints is required")),
    }
}

/// Append the configured transforms in their fixed order: path, method and
/// request headers; then status rules and response headers.
fn build_chain(
    config: &RouteConfig,
    mut builder: UpstreamBuilder,
    errors: &mut Errors,
) -> Option<UpstreamBuilder> {
    let before = errors.len();

    if let Some(path) = &config.remapping.path {
        if let Some(template) = errors.check(
            "remapping.path",
            PathTemplate::parse(path).map_err(BuildError::from),
        ) {
            builder = builder.remap_path(template);
        }
    }
    if let Some(method) = &config.remapping.method {
        if let Some(method) = errors.check("remapping.method", parse_method(method)) {
            builder = builder.method(method);
        }
    }
    if let Some(filter) = &config.request_headers {
        if let Some(filter) = errors.check("request_headers", header_filter(filter)) {
            builder = builder.filter_request_headers(filter);
        }
    }
    for (i, rule) in config.status.iter().enumerate() {
        let field = format!("status[{i}]");
        let from = rule
            .from
            .iter()
            .map(|spec| spec.resolve())
            .collect::<Result<Vec<_>, _>>()
            .and_then(StatusRemapper::from);
        let to = rule.to.resolve();
        match (from, to) {
            (Ok(from), Ok(to)) => builder = builder.status(from.to(to)),
            (Err(e), _) | (_, Err(e)) => errors.push(&field, e),
        }
    }
    if let Some(filter) = &config.response_headers {
        if let Some(filter) = errors.check("response_headers", header_filter(filter)) {
            builder = builder.filter_response_headers(filter);
        }
    }

    (errors.len() == before).then_some(builder)
}

fn header_filter(config: &HeaderFilterConfig) -> Result<HeaderFilter, BuildError> {
    match (&config.allow, &config.deny) {
        (Some(allow), None) => HeaderFilter::allow(allow),
        (None, Some(deny)) => HeaderFilter::deny(deny),
        _ => Err(BuildError::InvalidHeaderFilter(
            "exactly one of allow or deny is required".to_string(),
        )),
    }
}

fn parse_method(method: &str) -> Result<Method, BuildError> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| BuildError::InvalidMethod(method.to_string()))
}

fn parse_header_name(name: &str) -> Result<HeaderName, BuildError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| BuildError::InvalidHeaderName(name.to_string()))
}

/// Error collector scoped to one route.
struct Errors {
    scope: String,
    errors: Vec<ValidationError>,
}

impl Errors {
    fn new(scope: String) -> Self {
        Self {
            scope,
            errors: Vec::new(),
        }
    }

    fn push(&mut self, field: &str, message: impl ToString) {
        self.errors
            .push(ValidationError::new(format!("{}.{field}", self.scope), message));
    }

    fn check<T>(&mut self, field: &str, result: Result<T, BuildError>) -> Option<T> {
        result.map_err(|e| self.push(field, e)).ok()
    }

    fn len(&self) -> usize {
        self.errors.len()
    }

    fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    fn into_inner(self) -> Vec<ValidationError> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_config;
    use axum::http::{Request, StatusCode};

    fn route(toml_route: &str) -> RouteConfig {
        let config: GatewayConfig =
            toml::from_str(&format!("[[routes]]\n{toml_route}")).unwrap();
        config.routes.into_iter().next().unwrap()
    }

    #[test]
    fn test_resolve_target_forms() {
        let by_uri = resolve_target(&UpstreamConfig {
            uri: Some("http://backend:8080/api".into()),
            ..Default::default()
        })
        .unwrap();
        let by_endpoints = resolve_target(&UpstreamConfig {
            scheme: Some("http".into()),
            endpoints: vec!["backend:8080".into()],
            path: Some("/api".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(by_uri, by_endpoints);

        assert!(resolve_target(&UpstreamConfig {
            endpoints: vec!["backend:8080".into()],
            ..Default::default()
        })
        .is_err());
        assert!(resolve_target(&UpstreamConfig::default()).is_err());
    }

    #[test]
    fn test_resolve_collects_all_route_errors() {
        let config = route(
            r#"
            name = "broken"
            path = "/items/{id"
            methods = ["GET", "NOT A METHOD"]
            upstream = { uri = "http://backend" }
            remapping = { path = "/v2/{}" }
            status = [{ from = ["NOPE"], to = 200 }]
            "#,
        );
        let errors = RouteBlueprint::resolve(&config).err().unwrap();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "routes.broken.path",
                "routes.broken.methods",
                "routes.broken.remapping.path",
                "routes.broken.status[0]",
            ]
        );
    }

    #[test]
    fn test_compile_routes_shares_clients() {
        let config = parse_config(
            r#"
            [translation]
            timeout = 504

            [[routes]]
            name = "items"
            path = "/items/{id}"
            upstream = { uri = "http://backend:8080" }

            [[routes]]
            name = "orders"
            path_prefix = "/orders"
            methods = ["post"]
            priority = 5
            upstream = { scheme = "http", endpoints = ["BACKEND:8080"] }
            "#,
        )
        .unwrap();

        let registry = ClientRegistry::default();
        let table = compile_routes(&config, &registry).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.routes()[0].name(), "orders");
        assert_eq!(registry.len(), 1);

        let head = Request::builder()
            .method(Method::POST)
            .uri("/orders/1")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        assert_eq!(table.match_request(&head).unwrap().route.name(), "orders");
    }

    #[test]
    fn test_transport_options_use_separate_body_limits() {
        let config = parse_config(
            r#"
            [listener]
            max_body_size = 1024
            max_response_body_size = 4096

            [timeouts]
            connect_secs = 2
            request_secs = 9
            "#,
        )
        .unwrap();
        let options = transport_options(&config);
        assert_eq!(options.max_response_body, 4096);
        assert_eq!(options.connect_timeout, Duration::from_secs(2));
        assert_eq!(options.request_timeout, Duration::from_secs(9));
    }

    #[test]
    fn test_translator_from_config() {
        let config: TranslationConfig = toml::from_str(r#"timeout = "GATEWAY_TIMEOUT""#).unwrap();
        let translator = translator(&config).unwrap();
        let err = crate::error::DispatchError::Timeout(Duration::from_secs(1));
        assert_eq!(
            translator.translate(&err),
            crate::upstream::Translation::Status(StatusCode::GATEWAY_TIMEOUT)
        );

        let config: TranslationConfig = toml::from_str("timeout = 42").unwrap();
        let errors = super::translator(&config).unwrap_err();
        assert_eq!(errors[0].field, "translation.timeout");
    }
}
