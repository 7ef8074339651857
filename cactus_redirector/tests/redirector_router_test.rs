//! Router-level tests: every service and fault, driven through the axum
//! router without binding a socket.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use cactus_common::wire::FAULT_HEADER;
use cactus_common::{TestFailure, VERSION, fail};
use cactus_redirector::implicit::ImplicitSlot;
use cactus_redirector::implicit::ejb::EjbFields;
use cactus_redirector::implicit::jsp::{JspFields, Scope};
use cactus_redirector::implicit::web::ServletFields;
use cactus_redirector::wrapper::{WrappedObjects, current_implicit_objects};
use cactus_redirector::{
    ChainedResolver, Fixture, RedirectorConfig, TestCase, TestClass, TestRegistry, router,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceExt;

const SERVLET: &str = "/test/ServletRedirector";
const JSP: &str = "/test/JspRedirector";
const EJB: &str = "/test/EjbRedirector";

#[derive(Default)]
struct ServletTest {
    servlet: ServletFields,
}

impl Fixture for ServletTest {
    fn implicit_slot(&mut self) -> Option<ImplicitSlot<'_>> {
        Some(ImplicitSlot::Servlet(&mut self.servlet))
    }
}

#[derive(Default)]
struct JspTest {
    jsp: JspFields,
}

impl Fixture for JspTest {
    fn implicit_slot(&mut self) -> Option<ImplicitSlot<'_>> {
        Some(ImplicitSlot::Jsp(&mut self.jsp))
    }
}

#[derive(Default)]
struct EjbTest {
    ejb: EjbFields,
}

impl Fixture for EjbTest {
    fn implicit_slot(&mut self) -> Option<ImplicitSlot<'_>> {
        Some(ImplicitSlot::Ejb(&mut self.ejb))
    }
}

/// A plain unit test that reaches implicit objects only through its wrapper.
struct PlainTest;

impl Fixture for PlainTest {}

fn app() -> Router {
    let servlet = TestClass::new("ServletTest", |_| ServletTest::default())
        .method("testFoo", |_| Ok(()))
        .method("testBar", |_| {
            Err(TestFailure::new("IllegalStateException", "boom"))
        })
        .method("testSession", |t| {
            t.servlet.session()?;
            Ok(())
        })
        .method("testWrite", |t| {
            t.servlet.response()?.write_str("<p>written</p>")?;
            Ok(())
        })
        .method("testNotFound", |t| {
            t.servlet.response()?.set_status(404);
            Ok(())
        })
        .method("testParameters", |t| {
            let request = t.servlet.request()?;
            if request.parameter("user") != Some("alice") {
                return fail("user parameter missing");
            }
            if request.parameter_names().iter().any(|n| n.starts_with("Cactus_")) {
                return fail("internal parameters leaked");
            }
            Ok(())
        })
        .method("testSimulatedUrl", |t| {
            let request = t.servlet.request()?;
            if request.server_name() != "jakarta.apache.org" {
                return fail(format!("server name was {}", request.server_name()));
            }
            if request.request_uri() != "/mywebapp/myservlet/info" {
                return fail(format!("request URI was {}", request.request_uri()));
            }
            Ok(())
        })
        .method("testInitParameter", |t| {
            match t.servlet.config()?.init_parameter("greeting").as_deref() {
                Some("hello") => Ok(()),
                other => fail(format!("init parameter was {other:?}")),
            }
        });

    let jsp = TestClass::new("JspTest", |_| JspTest::default()).method("testOut", |t| {
        let page = t.jsp.page_context()?;
        page.set_attribute("name", "value".to_string(), Scope::Request);
        if page.find_attribute::<String>("name").is_none() {
            return fail("request attribute not found");
        }
        t.jsp.out()?.print("from jsp")?;
        Ok(())
    });

    let ejb = TestClass::new("EjbTest", |_| EjbTest::default())
        .method("testParameter", |t| {
            match t.ejb.request()?.parameter("amount") {
                Some("42") => Ok(()),
                other => fail(format!("amount was {other:?}")),
            }
        })
        .method("testRollback", |t| {
            t.ejb.context()?.set_rollback_only();
            Ok(())
        })
        .method("testFresh", |t| {
            if t.ejb.context()?.rollback_only() {
                return fail("rollback-only carried over from an earlier request");
            }
            Ok(())
        });

    let plain = TestClass::new("PlainTest", |_| PlainTest).method("testWrapped", |_| {
        match current_implicit_objects() {
            Some(WrappedObjects::Servlet(fields)) => {
                fields.request()?;
                Ok(())
            }
            _ => fail("no wrapper objects published"),
        }
    });

    let needs_jar = TestClass::new("HttpUnitTest", |_| PlainTest)
        .requires("com/meterware/httpunit/WebResponse")
        .method("testFoo", |_| Ok(()));

    let registry = TestRegistry::new()
        .register(servlet)
        .register(jsp)
        .register(ejb)
        .register(plain)
        .register(needs_jar);

    let config = RedirectorConfig {
        init_parameters: BTreeMap::from([("greeting".to_string(), "hello".to_string())]),
        ..Default::default()
    };
    router(config, Arc::new(ChainedResolver::with_registry(registry)))
}

async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn fault(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(FAULT_HEADER)
        .and_then(|v| v.to_str().ok())
}

async fn call_then_fetch(app: &Router, path: &str, query: &str) -> String {
    let response = get(app, &format!("{path}?Cactus_Service=CALL_TEST&{query}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(fault(&response), None);
    let response = get(app, &format!("{path}?Cactus_Service=GET_RESULTS")).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_text(response).await
}

#[tokio::test]
async fn health_reports_the_version() {
    let response = get(&app(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], VERSION);
}

#[tokio::test]
async fn run_test_is_a_connectivity_check() {
    let response = get(&app(), &format!("{SERVLET}?Cactus_Service=RUN_TEST")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(fault(&response), None);
    assert_eq!(body_text(response).await, "");
}

#[tokio::test]
async fn get_version_writes_the_framework_version() {
    let response = get(&app(), &format!("{SERVLET}?Cactus_Service=GET_VERSION")).await;
    assert_eq!(body_text(response).await, VERSION);
}

#[tokio::test]
async fn missing_service_is_a_protocol_fault() {
    let response = get(&app(), &format!("{SERVLET}?Cactus_TestClass=ServletTest")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(fault(&response), Some("protocol"));
    assert_eq!(
        body_text(response).await,
        "Missing service name parameter [Cactus_Service] in request"
    );
}

#[tokio::test]
async fn unknown_service_names_the_value() {
    let response = get(&app(), &format!("{SERVLET}?Cactus_Service=DANCE")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Unknown service [DANCE] in request");
}

#[tokio::test]
async fn call_test_without_method_is_a_protocol_fault() {
    let response = get(
        &app(),
        &format!("{SERVLET}?Cactus_Service=CALL_TEST&Cactus_TestClass=ServletTest"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("[Cactus_TestMethod]"));
}

#[tokio::test]
async fn passing_test_round_trip() {
    let app = app();
    let body = call_then_fetch(&app, SERVLET, "Cactus_TestClass=ServletTest&Cactus_TestMethod=testFoo").await;
    assert_eq!(body, "<webresult></webresult>");
}

#[tokio::test]
async fn failing_test_round_trip() {
    let app = app();
    let body = call_then_fetch(&app, SERVLET, "Cactus_TestClass=ServletTest&Cactus_TestMethod=testBar").await;
    assert!(body.starts_with(
        "<webresult><exception classname=\"IllegalStateException\"><message><![CDATA[boom]]></message>"
    ));
}

#[tokio::test]
async fn results_can_only_be_fetched_once() {
    let app = app();
    call_then_fetch(&app, SERVLET, "Cactus_TestClass=ServletTest&Cactus_TestMethod=testFoo").await;
    let response = get(&app, &format!("{SERVLET}?Cactus_Service=GET_RESULTS")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(fault(&response), Some("no-result"));
}

#[tokio::test]
async fn unknown_class_is_reported_as_the_test_outcome() {
    let app = app();
    let body = call_then_fetch(&app, SERVLET, "Cactus_TestClass=NoSuchTest&Cactus_TestMethod=testFoo").await;
    assert!(body.contains("<exception"));
    assert!(body.contains("[NoSuchTest]"));
}

#[tokio::test]
async fn missing_library_gets_a_remediation_message() {
    let response = get(
        &app(),
        &format!("{SERVLET}?Cactus_Service=CALL_TEST&Cactus_TestClass=HttpUnitTest&Cactus_TestMethod=testFoo"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(fault(&response), Some("missing-library"));
    let body = body_text(response).await;
    assert!(body.contains("com/meterware/httpunit/WebResponse"));
    assert!(body.contains("WEB-INF/lib"));
}

#[tokio::test]
async fn create_session_sets_the_session_cookie() {
    let response = get(&app(), &format!("{SERVLET}?Cactus_Service=CREATE_SESSION")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("JSESSIONID="));
    assert!(cookie.ends_with("; Path=/test"));
}

#[tokio::test]
async fn automatic_session_is_created_for_the_test() {
    let app = app();
    let response = get(
        &app,
        &format!(
            "{SERVLET}?Cactus_Service=CALL_TEST&Cactus_TestClass=ServletTest\
             &Cactus_TestMethod=testSession&Cactus_AutomaticSession=true"
        ),
    )
    .await;
    assert!(response.headers().contains_key(header::SET_COOKIE));
    let response = get(&app, &format!("{SERVLET}?Cactus_Service=GET_RESULTS")).await;
    assert_eq!(body_text(response).await, "<webresult></webresult>");

    let body = call_then_fetch(
        &app,
        SERVLET,
        "Cactus_TestClass=ServletTest&Cactus_TestMethod=testSession&Cactus_AutomaticSession=false",
    )
    .await;
    assert!(body.contains("No session was injected into this test"));
}

#[tokio::test]
async fn test_output_is_the_call_test_reply() {
    let app = app();
    let response = get(
        &app,
        &format!("{SERVLET}?Cactus_Service=CALL_TEST&Cactus_TestClass=ServletTest&Cactus_TestMethod=testWrite"),
    )
    .await;
    assert_eq!(body_text(response).await, "<p>written</p>");

    let response = get(
        &app,
        &format!("{SERVLET}?Cactus_Service=CALL_TEST&Cactus_TestClass=ServletTest&Cactus_TestMethod=testNotFound"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(fault(&response), None);
}

#[tokio::test]
async fn posted_parameters_reach_the_test() {
    let app = app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!(
                    "{SERVLET}?Cactus_Service=CALL_TEST&Cactus_TestClass=ServletTest&Cactus_TestMethod=testParameters"
                ))
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("user=alice"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = get(&app, &format!("{SERVLET}?Cactus_Service=GET_RESULTS")).await;
    assert_eq!(body_text(response).await, "<webresult></webresult>");
}

#[tokio::test]
async fn simulated_url_is_seen_by_the_test() {
    let app = app();
    let body = call_then_fetch(
        &app,
        SERVLET,
        "Cactus_TestClass=ServletTest&Cactus_TestMethod=testSimulatedUrl\
         &Cactus_URL_Server=jakarta.apache.org&Cactus_URL_ContextPath=%2Fmywebapp\
         &Cactus_URL_ServletPath=%2Fmyservlet&Cactus_URL_PathInfo=%2Finfo",
    )
    .await;
    assert_eq!(body, "<webresult></webresult>");
}

#[tokio::test]
async fn init_parameters_come_from_the_configuration() {
    let app = app();
    let body = call_then_fetch(&app, SERVLET, "Cactus_TestClass=ServletTest&Cactus_TestMethod=testInitParameter").await;
    assert_eq!(body, "<webresult></webresult>");
}

#[tokio::test]
async fn jsp_redirector_injects_the_page_context() {
    let app = app();
    let response = get(
        &app,
        &format!("{JSP}?Cactus_Service=CALL_TEST&Cactus_TestClass=JspTest&Cactus_TestMethod=testOut"),
    )
    .await;
    assert_eq!(body_text(response).await, "from jsp");
    let response = get(&app, &format!("{JSP}?Cactus_Service=GET_RESULTS")).await;
    assert_eq!(body_text(response).await, "<webresult></webresult>");
}

#[tokio::test]
async fn ejb_redirector_injects_the_ejb_request() {
    let app = app();
    let body = call_then_fetch(
        &app,
        EJB,
        "Cactus_TestClass=EjbTest&Cactus_TestMethod=testParameter&amount=42",
    )
    .await;
    assert_eq!(body, "<webresult></webresult>");
}

#[tokio::test]
async fn ejb_rollback_flag_is_per_request() {
    let app = app();
    let body = call_then_fetch(
        &app,
        EJB,
        "Cactus_TestClass=EjbTest&Cactus_TestMethod=testRollback",
    )
    .await;
    assert_eq!(body, "<webresult></webresult>");
    let body = call_then_fetch(
        &app,
        EJB,
        "Cactus_TestClass=EjbTest&Cactus_TestMethod=testFresh",
    )
    .await;
    assert_eq!(body, "<webresult></webresult>");
}

#[tokio::test]
async fn ejb_redirector_does_not_create_sessions() {
    let response = get(&app(), &format!("{EJB}?Cactus_Service=CREATE_SESSION")).await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(fault(&response), Some("unsupported"));
    assert_eq!(
        body_text(response).await,
        "Service [CREATE_SESSION] is not supported by the EJB redirector"
    );
}

#[tokio::test]
async fn wrapped_tests_reach_the_wrapper_objects() {
    let app = app();
    let body = call_then_fetch(
        &app,
        SERVLET,
        "Cactus_TestClass=ServletTestCaseWrapper&Cactus_WrappedTestClass=PlainTest&Cactus_TestMethod=testWrapped",
    )
    .await;
    assert_eq!(body, "<webresult></webresult>");
}

#[tokio::test]
async fn servlet_test_sees_no_injection_from_the_ejb_redirector() {
    let app = app();
    let body = call_then_fetch(&app, EJB, "Cactus_TestClass=ServletTest&Cactus_TestMethod=testWrite").await;
    assert!(body.contains("No response was injected into this test"));
}

#[test]
fn test_classes_are_test_cases() {
    use cactus_redirector::TestFactory;

    let class = TestClass::new("PlainTest", |_| PlainTest).method("testWrapped", |_| Ok(()));
    let test: Box<dyn TestCase> = class.instantiate("testWrapped").unwrap();
    assert_eq!(test.class_name(), "PlainTest");
}
