//! Endpoint registry.
//!
//! Maps endpoint and method names to their declared access markers and
//! handlers. Built once at startup (from code or from config) and shared
//! read-only afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::config::EndpointConfig;
use crate::security::annotations::{AccessAnnotation, AnnotationSet};

/// Handler invoked once a call has been allowed.
pub type MethodHandler = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Handler returning the request body unchanged.
pub fn echo_handler() -> MethodHandler {
    Arc::new(|body| body)
}

/// Whether a method can be called from outside its endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// A method declared on an endpoint.
#[derive(Clone)]
pub struct EndpointMethod {
    name: String,
    visibility: Visibility,
    annotations: AnnotationSet,
    handler: MethodHandler,
}

impl EndpointMethod {
    /// Create a public method with no access markers and an echo handler.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            annotations: AnnotationSet::new(),
            handler: echo_handler(),
        }
    }

    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    pub fn annotated(mut self, annotation: AccessAnnotation) -> Self {
        self.annotations.insert(annotation);
        self
    }

    pub fn with_annotations(mut self, annotations: AnnotationSet) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.handler = Arc::new(handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    pub fn invoke(&self, body: Value) -> Value {
        (self.handler)(body)
    }
}

impl fmt::Debug for EndpointMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointMethod")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("annotations", &self.annotations)
            .finish_non_exhaustive()
    }
}

/// An endpoint: the declaring scope of a group of methods.
#[derive(Debug, Clone)]
pub struct Endpoint {
    name: String,
    annotations: AnnotationSet,
    methods: BTreeMap<String, EndpointMethod>,
}

impl Endpoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotations: AnnotationSet::new(),
            methods: BTreeMap::new(),
        }
    }

    pub fn annotated(mut self, annotation: AccessAnnotation) -> Self {
        self.annotations.insert(annotation);
        self
    }

    pub fn with_annotations(mut self, annotations: AnnotationSet) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn method(mut self, method: EndpointMethod) -> Self {
        self.methods.insert(method.name.clone(), method);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    pub fn methods(&self) -> impl Iterator<Item = &EndpointMethod> {
        self.methods.values()
    }

    /// Borrow a method together with its declaring endpoint.
    pub fn method_ref(&self, name: &str) -> Option<MethodRef<'_>> {
        self.methods.get(name).map(|method| MethodRef {
            endpoint: self,
            method,
        })
    }

    pub fn method_refs(&self) -> impl Iterator<Item = MethodRef<'_>> {
        self.methods.values().map(move |method| MethodRef {
            endpoint: self,
            method,
        })
    }
}

/// A callable target: a method plus a handle on its declaring endpoint.
#[derive(Debug, Clone, Copy)]
pub struct MethodRef<'a> {
    pub endpoint: &'a Endpoint,
    pub method: &'a EndpointMethod,
}

impl MethodRef<'_> {
    /// `Endpoint.method` form used in logs and error messages.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.endpoint.name, self.method.name)
    }
}

/// Registry of all endpoints known to the server.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: BTreeMap<String, Endpoint>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from config. Every method gets `handler`.
    pub fn from_config(endpoints: &[EndpointConfig], handler: MethodHandler) -> Self {
        let mut registry = Self::new();
        for endpoint_config in endpoints {
            let mut endpoint = Endpoint::new(&endpoint_config.name)
                .with_annotations(endpoint_config.annotations.clone());
            for method_config in &endpoint_config.methods {
                let visibility = if method_config.public {
                    Visibility::Public
                } else {
                    Visibility::Private
                };
                let handler = handler.clone();
                endpoint = endpoint.method(EndpointMethod {
                    name: method_config.name.clone(),
                    visibility,
                    annotations: method_config.annotations.clone(),
                    handler,
                });
            }
            registry.register(endpoint);
        }
        registry
    }

    /// Register an endpoint, replacing any previous one with the same name.
    pub fn register(&mut self, endpoint: Endpoint) {
        tracing::debug!(
            endpoint = %endpoint.name,
            methods = endpoint.methods.len(),
            "Registering endpoint"
        );
        if let Some(previous) = self.endpoints.insert(endpoint.name.clone(), endpoint) {
            tracing::warn!(endpoint = %previous.name, "Endpoint registered twice, keeping the latest");
        }
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    /// Look up a method of any visibility.
    pub fn method(&self, endpoint: &str, method: &str) -> Option<MethodRef<'_>> {
        self.endpoints.get(endpoint)?.method_ref(method)
    }

    /// Look up a method callable from the outside. Non-public methods are
    /// not exposed.
    pub fn lookup(&self, endpoint: &str, method: &str) -> Option<MethodRef<'_>> {
        self.method(endpoint, method)
            .filter(|target| target.method.is_public())
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
