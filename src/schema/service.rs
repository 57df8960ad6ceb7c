//! Services, methods and HTTP bindings

use super::message::Message;
use super::qualify;
use crate::options::{self, strata, OptionsIndex};
use crate::GeneratorError;
use prost_types::{MethodDescriptorProto, ServiceDescriptorProto};

/// Where a request field is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// JSON body
    Body,
    /// URL query string
    Query,
    /// Path template parameter
    Path,
    /// Request header
    Header,
}

/// Authentication declared for a method
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Auth {
    /// Nothing declared
    #[default]
    Unspecified,
    /// No authentication
    Public,
    /// Bearer token
    Bearer,
    /// Named custom scheme
    Custom(String),
}

impl Auth {
    /// Stable textual form, e.g. `bearer` or `custom:apikey`
    pub fn as_label(&self) -> String {
        match self {
            Auth::Unspecified => "unspecified".to_string(),
            Auth::Public => "public".to_string(),
            Auth::Bearer => "bearer".to_string(),
            Auth::Custom(name) => format!("custom:{}", name),
        }
    }
}

/// HTTP binding of a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// HTTP verb, upper case
    pub verb: String,
    /// Path template with `{param}` segments
    pub path: String,
    /// Body selector: empty, `*` or a field name
    pub body: String,
    /// Fields read from headers
    pub headers: Vec<String>,
}

impl Endpoint {
    fn from_options(method: &str, opts: &strata::Endpoint) -> Result<Self, GeneratorError> {
        let verb = opts.method.to_ascii_uppercase();
        if !matches!(
            verb.as_str(),
            "GET" | "POST" | "PUT" | "PATCH" | "DELETE" | "HEAD" | "OPTIONS"
        ) {
            return Err(GeneratorError::annotation(
                method,
                format!("unsupported HTTP method `{}`", opts.method),
            ));
        }
        if !opts.path.starts_with('/') {
            return Err(GeneratorError::annotation(
                method,
                format!("endpoint path `{}` must start with `/`", opts.path),
            ));
        }
        Ok(Self {
            verb,
            path: opts.path.clone(),
            body: opts.body.clone(),
            headers: opts.headers.clone(),
        })
    }

    /// Names of the `{param}` segments, in order
    ///
    /// `{name=pattern}` binds `name`.
    pub fn path_params(&self) -> Vec<String> {
        let mut params = Vec::new();
        let mut rest = self.path.as_str();
        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            let inner = &rest[start + 1..start + len];
            let name = inner.split('=').next().unwrap_or(inner).trim();
            if !name.is_empty() {
                params.push(name.to_string());
            }
            rest = &rest[start + len + 1..];
        }
        params
    }

    /// Location of the request field named `field`
    pub fn locate(&self, field: &str) -> Location {
        if self.path_params().iter().any(|p| p == field) {
            Location::Path
        } else if self.headers.iter().any(|h| h == field) {
            Location::Header
        } else if self.body == "*" || self.body == field {
            Location::Body
        } else {
            Location::Query
        }
    }
}

/// One RPC method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    /// Method name
    pub name: String,
    /// Fully qualified name, without leading dot
    pub full_name: String,
    /// Request type name with leading dot
    pub input_type: String,
    /// Response type name with leading dot
    pub output_type: String,
    /// HTTP binding, if annotated
    pub endpoint: Option<Endpoint>,
    /// Declared authentication
    pub auth: Auth,
}

impl Method {
    fn from_descriptor(
        desc: &MethodDescriptorProto,
        service_full_name: &str,
        index: &OptionsIndex,
    ) -> Result<Self, GeneratorError> {
        let full_name = qualify(service_full_name, desc.name());
        let opts = options::parse_method_options(index, &full_name, desc)?.unwrap_or_default();

        let endpoint = opts
            .endpoint
            .as_ref()
            .map(|e| Endpoint::from_options(&full_name, e))
            .transpose()?;

        let auth = match opts.auth.as_ref() {
            None => Auth::Unspecified,
            Some(auth) => match auth.mode() {
                strata::AuthMode::Unspecified => Auth::Unspecified,
                strata::AuthMode::Public => Auth::Public,
                strata::AuthMode::Bearer => Auth::Bearer,
                strata::AuthMode::Custom if auth.custom.is_empty() => {
                    return Err(GeneratorError::annotation(
                        &full_name,
                        "custom auth mode requires a custom scheme name",
                    ))
                }
                strata::AuthMode::Custom => Auth::Custom(auth.custom.clone()),
            },
        };

        Ok(Self {
            name: desc.name().to_string(),
            full_name,
            input_type: desc.input_type().to_string(),
            output_type: desc.output_type().to_string(),
            endpoint,
            auth,
        })
    }

    /// Locate every field of `request` under this method's binding
    ///
    /// Every path parameter, header and body selector must name a field of
    /// the request message.
    pub fn bind(&self, request: &Message) -> Result<Vec<(String, Location)>, GeneratorError> {
        let Some(endpoint) = self.endpoint.as_ref() else {
            return Ok(Vec::new());
        };

        for param in endpoint.path_params() {
            let field = request.field(&param).ok_or_else(|| {
                GeneratorError::schema(
                    &self.full_name,
                    format!("path parameter `{}` is not a field of {}", param, request.name),
                )
            })?;
            if field.is_message() || field.is_array() || field.is_map() {
                return Err(GeneratorError::schema(
                    &self.full_name,
                    format!("path parameter `{}` must bind a scalar field", param),
                ));
            }
        }
        for header in &endpoint.headers {
            if request.field(header).is_none() {
                return Err(GeneratorError::schema(
                    &self.full_name,
                    format!("header `{}` is not a field of {}", header, request.name),
                ));
            }
        }
        if !endpoint.body.is_empty() && endpoint.body != "*" && request.field(&endpoint.body).is_none()
        {
            return Err(GeneratorError::schema(
                &self.full_name,
                format!(
                    "body selector `{}` is not a field of {}",
                    endpoint.body, request.name
                ),
            ));
        }

        Ok(request
            .fields
            .iter()
            .map(|f| (f.name.clone(), endpoint.locate(&f.name)))
            .collect())
    }
}

/// One service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    /// Service name
    pub name: String,
    /// Methods in declaration order
    pub methods: Vec<Method>,
}

impl Service {
    pub(crate) fn from_descriptor(
        desc: &ServiceDescriptorProto,
        package: &str,
        index: &OptionsIndex,
    ) -> Result<Self, GeneratorError> {
        let full_name = qualify(package, desc.name());
        let methods = desc
            .method
            .iter()
            .map(|m| Method::from_descriptor(m, &full_name, index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: desc.name().to_string(),
            methods,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(path: &str, body: &str, headers: &[&str]) -> Endpoint {
        Endpoint {
            verb: "POST".to_string(),
            path: path.to_string(),
            body: body.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
        }
    }

    #[test]
    fn test_path_params() {
        let e = endpoint("/v1/orgs/{org_id}/users/{user_id=*}", "", &[]);
        assert_eq!(e.path_params(), vec!["org_id", "user_id"]);
    }

    #[test]
    fn test_locate_order() {
        let e = endpoint("/v1/users/{id}", "*", &["trace_id"]);
        assert_eq!(e.locate("id"), Location::Path);
        assert_eq!(e.locate("trace_id"), Location::Header);
        assert_eq!(e.locate("name"), Location::Body);

        let e = endpoint("/v1/users", "profile", &[]);
        assert_eq!(e.locate("profile"), Location::Body);
        assert_eq!(e.locate("page"), Location::Query);
    }

    #[test]
    fn test_custom_auth_requires_name() {
        let desc = MethodDescriptorProto {
            name: Some("Login".to_string()),
            input_type: Some(".acme.LoginRequest".to_string()),
            output_type: Some(".acme.LoginResponse".to_string()),
            ..Default::default()
        };
        let mut index = OptionsIndex::default();
        index.insert_method(
            "acme.Users.Login",
            strata::MethodOptions {
                endpoint: None,
                auth: Some(strata::Auth {
                    mode: strata::AuthMode::Custom as i32,
                    custom: String::new(),
                }),
            },
        );
        let err = Method::from_descriptor(&desc, "acme.Users", &index).unwrap_err();
        assert!(matches!(err, GeneratorError::Annotation { .. }));
    }

    #[test]
    fn test_auth_labels() {
        assert_eq!(Auth::Custom("apikey".to_string()).as_label(), "custom:apikey");
        assert_eq!(Auth::Bearer.as_label(), "bearer");
    }
}
