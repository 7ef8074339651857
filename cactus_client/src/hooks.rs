//! Begin and end hooks.
//!
//! For a test method `testFoo`, `beginFoo` may prepare the outbound
//! [`WebRequest`] and `endFoo` may inspect the reply. The global hooks
//! `begin` and `end` run for every test: `begin` before the per-test begin
//! hook, `end` after the per-test end hook.
//!
//! Hooks are looked up by name together with their declared
//! [`MethodSignature`]. A hook with the wrong shape, or a name declared
//! twice, is a configuration error raised when the hook is looked up.

use crate::connection::HttpConnection;
use crate::error::{ClientError, Result};
use crate::request::WebRequest;
use crate::response::{EndResponse, HTTP_CONNECTION_TYPE, ResponseFactory, WEB_RESPONSE_TYPE, WebResponse};
use cactus_common::{TestFailure, TestResult};
use std::fmt;
use tracing::debug;

pub const TEST_METHOD_PREFIX: &str = "test";
pub const BEGIN_METHOD_PREFIX: &str = "begin";
pub const END_METHOD_PREFIX: &str = "end";
pub const GLOBAL_BEGIN_METHOD: &str = "begin";
pub const GLOBAL_END_METHOD: &str = "end";
pub const VOID_TYPE: &str = "void";
pub const WEB_REQUEST_TYPE: &str = "WebRequest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// Declared shape of a method on a client-side test class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: String,
    pub visibility: Visibility,
    pub return_type: String,
    pub parameter_types: Vec<String>,
}

impl MethodSignature {
    /// `public void name()`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            return_type: VOID_TYPE.to_string(),
            parameter_types: Vec::new(),
        }
    }

    pub fn returning(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = return_type.into();
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_parameter(mut self, parameter_type: impl Into<String>) -> Self {
        self.parameter_types.push(parameter_type.into());
        self
    }
}

/// Hook name for a test method: `testFoo` with prefix `begin` is `beginFoo`.
///
/// A method named just `test` has no per-test hooks: its name would be the
/// global `begin` or `end`, which already run once per test.
pub fn hook_name(prefix: &str, test_name: &str) -> Option<String> {
    let base = test_name.strip_prefix(TEST_METHOD_PREFIX).unwrap_or(test_name);
    (!base.is_empty()).then(|| format!("{prefix}{base}"))
}

type BeginFn<F> = Box<dyn Fn(&mut F, &mut WebRequest) -> TestResult + Send + Sync>;
type EndFn<F> = Box<dyn Fn(&mut F, &EndResponse) -> TestResult + Send + Sync>;

enum HookBody<F> {
    Begin(BeginFn<F>),
    End(EndFn<F>),
    /// Present on the class but not callable as a hook.
    Declared,
}

struct HookMethod<F> {
    signature: MethodSignature,
    body: HookBody<F>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HookKind {
    Begin,
    End,
}

/// The begin and end methods of one client-side test class.
pub struct HookTable<F> {
    methods: Vec<HookMethod<F>>,
}

impl<F> Default for HookTable<F> {
    fn default() -> Self {
        Self {
            methods: Vec::new(),
        }
    }
}

impl<F> fmt::Debug for HookTable<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookTable")
            .field(
                "methods",
                &self.methods.iter().map(|m| &m.signature).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<F: 'static> HookTable<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `public void name(WebRequest)`.
    pub fn begin(
        mut self,
        name: impl Into<String>,
        hook: impl Fn(&mut F, &mut WebRequest) -> TestResult + Send + Sync + 'static,
    ) -> Self {
        self.methods.push(HookMethod {
            signature: MethodSignature::new(name).with_parameter(WEB_REQUEST_TYPE),
            body: HookBody::Begin(Box::new(hook)),
        });
        self
    }

    /// Adds `public void name(WebResponse)`.
    pub fn end(
        mut self,
        name: impl Into<String>,
        hook: impl Fn(&mut F, &WebResponse) -> TestResult + Send + Sync + 'static,
    ) -> Self {
        self.methods.push(HookMethod {
            signature: MethodSignature::new(name).with_parameter(WEB_RESPONSE_TYPE),
            body: HookBody::End(Box::new(move |fixture: &mut F, response: &EndResponse| {
                match response {
                    EndResponse::Web(web) => hook(fixture, web),
                    other => Err(unexpected_response(WEB_RESPONSE_TYPE, other)),
                }
            })),
        });
        self
    }

    /// Adds `public void name(HttpConnection)`.
    pub fn end_connection(
        mut self,
        name: impl Into<String>,
        hook: impl Fn(&mut F, &HttpConnection) -> TestResult + Send + Sync + 'static,
    ) -> Self {
        self.methods.push(HookMethod {
            signature: MethodSignature::new(name).with_parameter(HTTP_CONNECTION_TYPE),
            body: HookBody::End(Box::new(move |fixture: &mut F, response: &EndResponse| {
                match response {
                    EndResponse::Connection(connection) => hook(fixture, connection),
                    other => Err(unexpected_response(HTTP_CONNECTION_TYPE, other)),
                }
            })),
        });
        self
    }

    /// Declares a method by signature only. It takes part in lookups and
    /// signature checks but has no body to call.
    pub fn declare(mut self, signature: MethodSignature) -> Self {
        self.methods.push(HookMethod {
            signature,
            body: HookBody::Declared,
        });
        self
    }
}

fn unexpected_response(expected: &str, got: &EndResponse) -> TestFailure {
    TestFailure::assertion(format!(
        "Expected a [{expected}] response but was given a [{}]",
        got.type_name()
    ))
}

fn signature_error(message: String) -> ClientError {
    ClientError::HookSignature(message)
}

fn check_signature(signature: &MethodSignature, kind: HookKind) -> Result<()> {
    let name = &signature.name;
    if signature.return_type != VOID_TYPE {
        return Err(signature_error(format!(
            "The method [{name}] should return void and not [{}]",
            signature.return_type
        )));
    }
    if signature.visibility != Visibility::Public {
        return Err(signature_error(format!(
            "The method [{name}] should be declared public"
        )));
    }
    if signature.parameter_types.len() != 1 {
        return Err(signature_error(format!(
            "The method [{name}] must have exactly one parameter, but it has [{}]",
            signature.parameter_types.len()
        )));
    }
    let parameter = &signature.parameter_types[0];
    match kind {
        HookKind::Begin if parameter != WEB_REQUEST_TYPE => Err(signature_error(format!(
            "The method [{name}] must accept a single parameter of type [{WEB_REQUEST_TYPE}], \
             but it has a parameter of type [{parameter}]"
        ))),
        HookKind::End if !ResponseFactory::supports(parameter) => Err(signature_error(format!(
            "The end method [{name}] has a bad parameter of type [{parameter}]"
        ))),
        _ => Ok(()),
    }
}

impl<F> HookTable<F> {
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.signature.name == name)
    }

    /// The single well-formed hook named `name`, if any.
    fn lookup(&self, name: &str, test_name: &str, kind: HookKind) -> Result<Option<&HookMethod<F>>> {
        let mut matches = self.methods.iter().filter(|m| m.signature.name == name);
        let Some(method) = matches.next() else {
            return Ok(None);
        };
        if matches.next().is_some() {
            return Err(signature_error(format!(
                "There can only be one method [{name}] per test case. \
                 Test case [{test_name}] has two at least!"
            )));
        }
        check_signature(&method.signature, kind)?;
        Ok(Some(method))
    }

    fn not_callable(name: &str) -> ClientError {
        signature_error(format!("The method [{name}] has no body that can be called"))
    }

    /// Calls the begin hook `name` if the class has one.
    pub fn call_begin(
        &self,
        name: &str,
        test_name: &str,
        fixture: &mut F,
        request: &mut WebRequest,
    ) -> Result<bool> {
        let Some(method) = self.lookup(name, test_name, HookKind::Begin)? else {
            return Ok(false);
        };
        let HookBody::Begin(hook) = &method.body else {
            return Err(Self::not_callable(name));
        };
        debug!(method = name, test_name, "Calling begin method");
        hook(fixture, request).map_err(|failure| ClientError::Hook {
            method: name.to_string(),
            failure,
        })?;
        Ok(true)
    }

    /// Calls the end hook `name` if the class has one, building the
    /// response type it declares.
    pub fn call_end(
        &self,
        name: &str,
        test_name: &str,
        fixture: &mut F,
        connection: &HttpConnection,
        request: &WebRequest,
    ) -> Result<bool> {
        let Some(method) = self.lookup(name, test_name, HookKind::End)? else {
            return Ok(false);
        };
        let HookBody::End(hook) = &method.body else {
            return Err(Self::not_callable(name));
        };
        let response = ResponseFactory::create(
            name,
            &method.signature.parameter_types[0],
            connection,
            request,
        )?;
        debug!(method = name, test_name, response = response.type_name(), "Calling end method");
        hook(fixture, &response).map_err(|failure| ClientError::Hook {
            method: name.to_string(),
            failure,
        })?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use cactus_common::fail;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    fn connection() -> HttpConnection {
        HttpConnection {
            url: "http://localhost/test/ServletRedirector".into(),
            status: 200,
            headers: Vec::new(),
            body: Bytes::from_static(b"hello"),
        }
    }

    fn begin_error(table: &HookTable<Recorder>, name: &str) -> String {
        table
            .call_begin(name, "testX", &mut Recorder::default(), &mut WebRequest::new())
            .unwrap_err()
            .to_string()
    }

    #[test]
    fn hook_names_drop_the_test_prefix() {
        assert_eq!(hook_name(BEGIN_METHOD_PREFIX, "testFoo").as_deref(), Some("beginFoo"));
        assert_eq!(hook_name(END_METHOD_PREFIX, "testFoo").as_deref(), Some("endFoo"));
        assert_eq!(hook_name(END_METHOD_PREFIX, "checkFoo").as_deref(), Some("endcheckFoo"));
    }

    #[test]
    fn bare_test_name_has_no_per_test_hook() {
        assert_eq!(hook_name(BEGIN_METHOD_PREFIX, "test"), None);
        assert_eq!(hook_name(END_METHOD_PREFIX, "test"), None);
    }

    #[test]
    fn missing_hooks_are_not_errors() {
        let table = HookTable::<Recorder>::new();
        let called = table
            .call_begin("beginFoo", "testFoo", &mut Recorder::default(), &mut WebRequest::new())
            .unwrap();
        assert!(!called);
    }

    #[test]
    fn begin_hooks_prepare_the_request() {
        let table = HookTable::new().begin("beginFoo", |recorder: &mut Recorder, request| {
            recorder.calls.push("beginFoo".into());
            request.add_parameter("user", "alice");
            Ok(())
        });
        let mut recorder = Recorder::default();
        let mut request = WebRequest::new();
        assert!(table.call_begin("beginFoo", "testFoo", &mut recorder, &mut request).unwrap());
        assert_eq!(recorder.calls, vec!["beginFoo"]);
        assert_eq!(request.post_parameter("user"), Some("alice"));
    }

    #[test]
    fn non_void_return_type_is_reported() {
        let table = HookTable::<Recorder>::new().declare(
            MethodSignature::new("beginX")
                .returning("String")
                .with_parameter(WEB_REQUEST_TYPE),
        );
        assert_eq!(
            begin_error(&table, "beginX"),
            "The method [beginX] should return void and not [String]"
        );
    }

    #[test]
    fn non_public_hooks_are_reported() {
        let table = HookTable::<Recorder>::new().declare(
            MethodSignature::new("beginX")
                .with_visibility(Visibility::Protected)
                .with_parameter(WEB_REQUEST_TYPE),
        );
        assert_eq!(
            begin_error(&table, "beginX"),
            "The method [beginX] should be declared public"
        );
    }

    #[test]
    fn parameter_count_and_type_are_reported() {
        let table = HookTable::<Recorder>::new().declare(MethodSignature::new("beginX"));
        assert_eq!(
            begin_error(&table, "beginX"),
            "The method [beginX] must have exactly one parameter, but it has [0]"
        );

        let table =
            HookTable::<Recorder>::new().declare(MethodSignature::new("beginX").with_parameter("String"));
        assert_eq!(
            begin_error(&table, "beginX"),
            "The method [beginX] must accept a single parameter of type [WebRequest], \
             but it has a parameter of type [String]"
        );
    }

    #[test]
    fn duplicate_hooks_are_reported() {
        let table = HookTable::<Recorder>::new()
            .end("endX", |_, _| Ok(()))
            .end_connection("endX", |_, _| Ok(()));
        let err = table
            .call_end("endX", "testX", &mut Recorder::default(), &connection(), &WebRequest::new())
            .unwrap_err();
        assert!(err.is_assertion());
        assert!(err.to_string().contains("can only be one method [endX]"));
    }

    #[test]
    fn end_hooks_get_their_declared_response_type() {
        let table = HookTable::new()
            .end("endWeb", |recorder: &mut Recorder, response| {
                recorder.calls.push(response.text());
                Ok(())
            })
            .end_connection("endRaw", |recorder: &mut Recorder, connection| {
                recorder.calls.push(connection.status().to_string());
                Ok(())
            });
        let mut recorder = Recorder::default();
        let request = WebRequest::new();
        table.call_end("endWeb", "testWeb", &mut recorder, &connection(), &request).unwrap();
        table.call_end("endRaw", "testRaw", &mut recorder, &connection(), &request).unwrap();
        assert_eq!(recorder.calls, vec!["hello", "200"]);
    }

    #[test]
    fn bad_end_parameter_type_is_reported() {
        let table =
            HookTable::<Recorder>::new().declare(MethodSignature::new("endX").with_parameter("String"));
        let err = table
            .call_end("endX", "testX", &mut Recorder::default(), &connection(), &WebRequest::new())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The end method [endX] has a bad parameter of type [String]"
        );
    }

    #[test]
    fn hook_failures_name_the_method() {
        let table = HookTable::<Recorder>::new().end("endX", |_, _| fail("wrong page"));
        let err = table
            .call_end("endX", "testX", &mut Recorder::default(), &connection(), &WebRequest::new())
            .unwrap_err();
        assert!(err.is_assertion());
        assert_eq!(
            err.to_string(),
            "Method [endX] failed: AssertionFailedError: wrong page"
        );
    }
}
