//! Request construction.
//!
//! [`RequestFactory`] turns a [`ServiceDescriptor`] plus per-call overrides
//! into a [`Request`]. Headers and options are merged in layers where the
//! first layer to set a key wins and later layers only fill missing keys:
//!
//! 1. per-call
//! 2. service
//! 3. global (configuration)
//! 4. runtime (`Api::add_header`)
//!
//! A header set at both service and global level keeps the service value.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::debug;

use crate::service::ServiceDescriptor;
use crate::{Agent, Error, Method, Query, Request, Result, TransportOption, UrlBuilder};

/// Per-call overrides applied on top of a service descriptor.
#[derive(Debug, Clone, Default)]
pub struct CallOverrides {
    /// Call data, shallow-merged over the service's default data.
    pub data: Option<Map<String, Value>>,
    /// Path parameters substituted into `:name` tokens.
    pub params: HashMap<String, String>,
    /// Query string.
    pub query: Query,
    /// Call headers (highest precedence).
    pub headers: HashMap<String, String>,
    /// Call options (highest precedence).
    pub options: Map<String, Value>,
    /// Method override.
    pub method: Option<Method>,
    /// Timeout override (beats any `timeout` option).
    pub timeout: Option<Duration>,
}

/// Builds [`Request`]s from descriptors and the configured defaults.
#[derive(Clone, Copy)]
pub struct RequestFactory<'a> {
    url_builder: &'a UrlBuilder,
    global_headers: &'a HashMap<String, String>,
    global_options: &'a Map<String, Value>,
    runtime_headers: &'a HashMap<String, String>,
    with_credentials: bool,
    agent: Option<&'a dyn Agent>,
}

impl std::fmt::Debug for RequestFactory<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestFactory")
            .field("global_headers", &self.global_headers)
            .field("global_options", &self.global_options)
            .field("runtime_headers", &self.runtime_headers)
            .field("with_credentials", &self.with_credentials)
            .field("has_agent", &self.agent.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> RequestFactory<'a> {
    /// Create a factory over the global defaults.
    #[must_use]
    pub const fn new(
        url_builder: &'a UrlBuilder,
        global_headers: &'a HashMap<String, String>,
        global_options: &'a Map<String, Value>,
        runtime_headers: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            url_builder,
            global_headers,
            global_options,
            runtime_headers,
            with_credentials: false,
            agent: None,
        }
    }

    /// Send credentials with every request.
    #[must_use]
    pub const fn with_credentials(mut self, enabled: bool) -> Self {
        self.with_credentials = enabled;
        self
    }

    /// Transport used to validate methods and options.
    #[must_use]
    pub const fn agent(mut self, agent: Option<&'a dyn Agent>) -> Self {
        self.agent = agent;
        self
    }

    /// Build the request for one call.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingAgent`] when no transport is configured
    /// - [`Error::UnsupportedMethod`] / [`Error::UnsupportedOption`] when the
    ///   transport lacks a capability
    /// - [`Error::Config`] for a missing path or a malformed option value
    pub fn build(&self, descriptor: &ServiceDescriptor, overrides: &CallOverrides) -> Result<Request> {
        let agent = self.agent.ok_or(Error::MissingAgent)?;

        let method = overrides.method.unwrap_or(descriptor.method());
        if !agent.supports_method(method) {
            return Err(Error::UnsupportedMethod(method.token().to_string()));
        }

        let mut url = descriptor.url(self.url_builder, &overrides.params, &overrides.query)?;

        let data = Self::merge_data(descriptor.data(), overrides.data.as_ref());
        let data = match data {
            Some(data) if method.data_in_query() => {
                let rendered = Query::Raw(crate::to_query_string(&data)?).render()?;
                url = crate::append_query(url, &rendered);
                None
            }
            Some(_) if method == Method::Delete => None,
            data => data.map(Value::Object),
        };

        let mut request = Request::builder(method, url).build();
        request.set_data(data);

        for layer in [
            &overrides.headers,
            descriptor.headers(),
            self.global_headers,
            self.runtime_headers,
        ] {
            for (name, value) in layer {
                request.set_header_if_missing(name.clone(), value.clone());
            }
        }

        if self.with_credentials {
            if !agent.supports_option(TransportOption::WithCredentials) {
                return Err(Error::UnsupportedOption(TransportOption::WithCredentials.to_string()));
            }
            request.options_mut().with_credentials = true;
        }

        let mut options = overrides.options.clone();
        for layer in [descriptor.options(), self.global_options] {
            for (name, value) in layer {
                options.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }
        for (name, value) in &options {
            let option: TransportOption = name.parse()?;
            if !agent.supports_option(option) {
                return Err(Error::UnsupportedOption(name.clone()));
            }
            option.apply(&mut request, value)?;
        }

        if let Some(timeout) = overrides.timeout {
            request.options_mut().timeout = Some(timeout);
        }

        debug!(
            service = descriptor.id(),
            method = %request.method(),
            url = request.url(),
            "request built"
        );
        Ok(request)
    }

    fn merge_data(
        defaults: &Map<String, Value>,
        call: Option<&Map<String, Value>>,
    ) -> Option<Map<String, Value>> {
        let mut data = defaults.clone();
        if let Some(call) = call {
            data.extend(call.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        (!data.is_empty()).then_some(data)
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use serde_json::json;

    use super::*;
    use crate::config::{ServiceConfig, ServiceSpec};
    use crate::{AgentFuture, Response};

    struct EchoAgent {
        refuse: Option<TransportOption>,
    }

    impl Agent for EchoAgent {
        fn execute(&self, _request: Request) -> AgentFuture {
            Box::pin(async { Ok(Response::new(200, HashMap::new(), bytes::Bytes::new())) })
        }

        fn supports_method(&self, method: Method) -> bool {
            method != Method::Options
        }

        fn supports_option(&self, option: TransportOption) -> bool {
            self.refuse != Some(option)
        }
    }

    const AGENT: EchoAgent = EchoAgent { refuse: None };

    fn descriptor(config: impl Into<ServiceConfig>) -> ServiceDescriptor {
        ServiceDescriptor::from_config("api", "svc", "http://example.tld", &config.into())
            .expect("descriptor")
    }

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    struct Fixture {
        builder: UrlBuilder,
        global_headers: HashMap<String, String>,
        global_options: Map<String, Value>,
        runtime_headers: HashMap<String, String>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                builder: UrlBuilder::default(),
                global_headers: HashMap::new(),
                global_options: Map::new(),
                runtime_headers: HashMap::new(),
            }
        }

        fn factory(&self) -> RequestFactory<'_> {
            RequestFactory::new(
                &self.builder,
                &self.global_headers,
                &self.global_options,
                &self.runtime_headers,
            )
            .agent(Some(&AGENT))
        }
    }

    #[test]
    fn post_with_params_and_data() {
        let fixture = Fixture::new();
        let overrides = CallOverrides {
            params: HashMap::from([("id".to_string(), "42".to_string())]),
            data: Some(map(json!({"x": 1}))),
            ..CallOverrides::default()
        };

        let request = fixture
            .factory()
            .build(&descriptor(ServiceSpec::new("/foo/:id").method("POST")), &overrides)
            .expect("request");

        check!(request.method() == Method::Post);
        check!(request.url() == "http://example.tld/foo/42");
        check!(request.data() == Some(&json!({"x": 1})));
    }

    #[test]
    fn service_option_wins_over_global() {
        let mut fixture = Fixture::new();
        fixture.global_options = map(json!({"type": "json"}));

        let request = fixture
            .factory()
            .build(
                &descriptor(ServiceSpec::new("/foo").method("post").option("type", "form")),
                &CallOverrides::default(),
            )
            .expect("request");

        check!(request.header("Content-Type") == Some("application/x-www-form-urlencoded"));
    }

    #[test]
    fn header_precedence_service_global_runtime() {
        let mut fixture = Fixture::new();
        fixture.global_headers = HashMap::from([
            ("X-Layer".to_string(), "global".to_string()),
            ("X-Global".to_string(), "yes".to_string()),
        ]);
        fixture.runtime_headers = HashMap::from([
            ("x-layer".to_string(), "runtime".to_string()),
            ("X-Global".to_string(), "runtime".to_string()),
            ("X-Runtime".to_string(), "yes".to_string()),
        ]);

        let request = fixture
            .factory()
            .build(
                &descriptor(ServiceSpec::new("/foo").header("X-Layer", "service")),
                &CallOverrides::default(),
            )
            .expect("request");

        check!(request.header("X-Layer") == Some("service"));
        check!(request.header("X-Global") == Some("yes"));
        check!(request.header("X-Runtime") == Some("yes"));
        check!(request.headers().len() == 3);
    }

    #[test]
    fn call_headers_win() {
        let fixture = Fixture::new();
        let overrides = CallOverrides {
            headers: HashMap::from([("X-Layer".to_string(), "call".to_string())]),
            ..CallOverrides::default()
        };

        let request = fixture
            .factory()
            .build(&descriptor(ServiceSpec::new("/foo").header("X-Layer", "service")), &overrides)
            .expect("request");

        check!(request.header("X-Layer") == Some("call"));
    }

    #[test]
    fn call_data_is_merged_over_defaults() {
        let fixture = Fixture::new();
        let overrides = CallOverrides {
            data: Some(map(json!({"b": 3, "c": 4}))),
            ..CallOverrides::default()
        };

        let request = fixture
            .factory()
            .build(
                &descriptor(ServiceSpec::new("/foo").method("put").data("a", 1).data("b", 2)),
                &overrides,
            )
            .expect("request");

        check!(request.data() == Some(&json!({"a": 1, "b": 3, "c": 4})));
    }

    #[test]
    fn get_data_moves_to_query() {
        let fixture = Fixture::new();
        let overrides = CallOverrides {
            data: Some(map(json!({"page": 2}))),
            query: Query::from("sort=asc"),
            ..CallOverrides::default()
        };

        let request = fixture
            .factory()
            .build(&descriptor("/items"), &overrides)
            .expect("request");

        check!(request.url() == "http://example.tld/items?sort=asc&page=2");
        check!(request.data().is_none());
    }

    #[test]
    fn delete_drops_data() {
        let fixture = Fixture::new();
        let overrides = CallOverrides {
            data: Some(map(json!({"x": 1}))),
            ..CallOverrides::default()
        };

        let request = fixture
            .factory()
            .build(&descriptor(ServiceSpec::new("/foo").method("delete")), &overrides)
            .expect("request");

        check!(request.method() == Method::Delete);
        check!(request.data().is_none());
    }

    #[test]
    fn unsupported_option_names_the_key() {
        let fixture = Fixture::new();
        let_assert!(
            Err(Error::UnsupportedOption(name)) = fixture.factory().build(
                &descriptor(ServiceSpec::new("/foo").option("attach", "file.txt")),
                &CallOverrides::default(),
            )
        );
        check!(name == "attach");
    }

    #[test]
    fn option_refused_by_agent() {
        let fixture = Fixture::new();
        let agent = EchoAgent {
            refuse: Some(TransportOption::Timeout),
        };
        let factory = fixture.factory().agent(Some(&agent));
        let_assert!(
            Err(Error::UnsupportedOption(name)) = factory.build(
                &descriptor(ServiceSpec::new("/foo").option("timeout", 10)),
                &CallOverrides::default(),
            )
        );
        check!(name == "timeout");
    }

    #[test]
    fn missing_agent() {
        let fixture = Fixture::new();
        let factory = fixture.factory().agent(None);
        let_assert!(
            Err(Error::MissingAgent) = factory.build(&descriptor("/foo"), &CallOverrides::default())
        );
    }

    #[test]
    fn unsupported_method() {
        let fixture = Fixture::new();
        let_assert!(
            Err(Error::UnsupportedMethod(name)) = fixture.factory().build(
                &descriptor(ServiceSpec::new("/foo").method("OPTIONS")),
                &CallOverrides::default(),
            )
        );
        check!(name == "options");
    }

    #[test]
    fn timeout_precedence() {
        let mut fixture = Fixture::new();
        fixture.global_options = map(json!({"timeout": 1000}));

        let global = fixture
            .factory()
            .build(&descriptor("/foo"), &CallOverrides::default())
            .expect("request");
        check!(global.options().timeout == Some(Duration::from_millis(1000)));

        let service = fixture
            .factory()
            .build(
                &descriptor(ServiceSpec::new("/foo").option("timeout", 500)),
                &CallOverrides::default(),
            )
            .expect("request");
        check!(service.options().timeout == Some(Duration::from_millis(500)));

        let call = fixture
            .factory()
            .build(
                &descriptor(ServiceSpec::new("/foo").option("timeout", 500)),
                &CallOverrides {
                    timeout: Some(Duration::from_millis(50)),
                    ..CallOverrides::default()
                },
            )
            .expect("request");
        check!(call.options().timeout == Some(Duration::from_millis(50)));
    }

    #[test]
    fn with_credentials_flag() {
        let fixture = Fixture::new();
        let request = fixture
            .factory()
            .with_credentials(true)
            .build(&descriptor("/foo"), &CallOverrides::default())
            .expect("request");
        check!(request.options().with_credentials);
    }

    #[test]
    fn with_credentials_flag_refused_by_agent() {
        let fixture = Fixture::new();
        let agent = EchoAgent {
            refuse: Some(TransportOption::WithCredentials),
        };
        let_assert!(
            Err(Error::UnsupportedOption(name)) = fixture
                .factory()
                .agent(Some(&agent))
                .with_credentials(true)
                .build(&descriptor("/foo"), &CallOverrides::default())
        );
        check!(name == "withCredentials");
    }
}
