//! Client exchanges against a mocked redirector: fault detection, result
//! parsing, version and session services, and what goes on the wire.

use cactus_client::{
    ClientConfiguration, ClientError, RedirectorKind, TestTarget, WebRequest, WebTestClient,
};
use cactus_common::parser::to_xml;
use cactus_common::wire::FAULT_HEADER;
use cactus_common::{VERSION, WebTestResult};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SERVLET: &str = "/test/ServletRedirector";

fn client(server: &MockServer) -> WebTestClient {
    let config = ClientConfiguration::default().with_context_url(format!("{}/test", server.uri()));
    WebTestClient::http(config, RedirectorKind::Servlet).unwrap()
}

async fn mount_service(server: &MockServer, service: &str, response: ResponseTemplate) {
    Mock::given(path(SERVLET))
        .and(query_param("Cactus_Service", service))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn fault_header_becomes_a_redirector_error() {
    let server = MockServer::start().await;
    mount_service(
        &server,
        "CALL_TEST",
        ResponseTemplate::new(400)
            .insert_header(FAULT_HEADER, "protocol")
            .set_body_string("Missing test method name parameter [Cactus_TestMethod] in request"),
    )
    .await;

    let err = client(&server)
        .do_test(&mut WebRequest::new(), &TestTarget::new("ServletTest", "testFoo"))
        .await
        .unwrap_err();
    match err {
        ClientError::Redirector {
            status,
            kind,
            message,
        } => {
            assert_eq!(status, 400);
            assert_eq!(kind, "protocol");
            assert!(message.contains("[Cactus_TestMethod]"));
        }
        other => panic!("expected a redirector fault, got {other:?}"),
    }
}

#[tokio::test]
async fn test_status_alone_is_not_a_fault() {
    let server = MockServer::start().await;
    mount_service(
        &server,
        "CALL_TEST",
        ResponseTemplate::new(500).set_body_string("the test chose this status"),
    )
    .await;
    mount_service(
        &server,
        "GET_RESULTS",
        ResponseTemplate::new(200).set_body_string(to_xml(&WebTestResult::Ok)),
    )
    .await;

    let (reply, result) = client(&server)
        .do_test(&mut WebRequest::new(), &TestTarget::new("ServletTest", "testFoo"))
        .await
        .unwrap();
    assert_eq!(reply.status(), 500);
    assert_eq!(reply.text(), "the test chose this status");
    assert_eq!(result, WebTestResult::Ok);
}

#[tokio::test]
async fn malformed_result_payload_is_a_parsing_error() {
    let server = MockServer::start().await;
    mount_service(&server, "CALL_TEST", ResponseTemplate::new(200)).await;
    mount_service(
        &server,
        "GET_RESULTS",
        ResponseTemplate::new(200).set_body_string("<html>Not the redirector</html>"),
    )
    .await;

    let err = client(&server)
        .do_test(&mut WebRequest::new(), &TestTarget::new("ServletTest", "testFoo"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Parsing(_)), "got {err:?}");
    assert!(err.to_string().contains("<html>Not the redirector"));
}

#[tokio::test]
async fn failed_results_are_returned_as_envelopes() {
    let server = MockServer::start().await;
    mount_service(&server, "CALL_TEST", ResponseTemplate::new(200)).await;
    let failed = WebTestResult::failed(
        "IllegalStateException",
        "boom",
        "IllegalStateException: boom\n\tat ServletTest.testBar",
    );
    mount_service(
        &server,
        "GET_RESULTS",
        ResponseTemplate::new(200).set_body_string(to_xml(&failed)),
    )
    .await;

    let (_, result) = client(&server)
        .do_test(&mut WebRequest::new(), &TestTarget::new("ServletTest", "testBar"))
        .await
        .unwrap();
    assert_eq!(result, failed);
}

#[tokio::test]
async fn post_parameters_and_credentials_reach_the_redirector() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SERVLET))
        .and(query_param("Cactus_Service", "CALL_TEST"))
        .and(query_param("Cactus_TestClass", "ServletTest"))
        .and(query_param("Cactus_TestMethod", "testParameters"))
        .and(query_param("Cactus_AutomaticSession", "true"))
        .and(query_param("page", "2"))
        .and(header("authorization", "Basic YWxpY2U6c2VjcmV0"))
        .and(header("x-trace", "on"))
        .and(body_string_contains("user=alice"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SERVLET))
        .and(query_param("Cactus_Service", "GET_RESULTS"))
        .and(header("authorization", "Basic YWxpY2U6c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(to_xml(&WebTestResult::Ok)))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = WebRequest::new();
    request.add_parameter("user", "alice");
    request.add_parameter_with("page", "2", cactus_client::ParamMethod::Get);
    request.add_header("X-Trace", "on");
    request.set_authentication("alice", "secret");

    let (_, result) = client(&server)
        .do_test(&mut request, &TestTarget::new("ServletTest", "testParameters"))
        .await
        .unwrap();
    assert_eq!(result, WebTestResult::Ok);
}

#[tokio::test]
async fn redirector_name_override_applies_to_both_exchanges() {
    let server = MockServer::start().await;
    Mock::given(path("/test/OtherRedirector"))
        .and(query_param("Cactus_Service", "CALL_TEST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/test/OtherRedirector"))
        .and(query_param("Cactus_Service", "GET_RESULTS"))
        .respond_with(ResponseTemplate::new(200).set_body_string(to_xml(&WebTestResult::Ok)))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = WebRequest::new();
    request.set_redirector_name("OtherRedirector");
    client(&server)
        .do_test(&mut request, &TestTarget::new("ServletTest", "testFoo"))
        .await
        .unwrap();
}

#[tokio::test]
async fn version_mismatch_is_reported() {
    let server = MockServer::start().await;
    mount_service(
        &server,
        "GET_VERSION",
        ResponseTemplate::new(200).set_body_string("99.0.0-other\n"),
    )
    .await;

    let client = client(&server);
    assert_eq!(client.get_version().await.unwrap(), "99.0.0-other");
    match client.check_version().await.unwrap_err() {
        ClientError::VersionMismatch { client, server } => {
            assert_eq!(client, VERSION);
            assert_eq!(server, "99.0.0-other");
        }
        other => panic!("expected a version mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn session_cookie_is_found_case_insensitively() {
    let server = MockServer::start().await;
    mount_service(
        &server,
        "CREATE_SESSION",
        ResponseTemplate::new(200).insert_header("Set-Cookie", "jsessionid=abc123; Path=/test"),
    )
    .await;

    let cookie = client(&server).create_session_cookie().await.unwrap();
    assert_eq!(cookie.value, "abc123");
    assert_eq!(cookie.path.as_deref(), Some("/test"));
}

#[tokio::test]
async fn missing_session_cookie_is_a_session_error() {
    let server = MockServer::start().await;
    mount_service(&server, "CREATE_SESSION", ResponseTemplate::new(200)).await;

    let err = client(&server).create_session_cookie().await.unwrap_err();
    assert!(matches!(err, ClientError::Session(_)), "got {err:?}");
    assert!(err.to_string().starts_with("Failed to create a new HTTP session"));
}

#[tokio::test]
async fn unreachable_redirector_is_an_http_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let config = ClientConfiguration::default().with_context_url(format!("http://{addr}/test"));

    let client = WebTestClient::http(config, RedirectorKind::Servlet).unwrap();
    let err = client.check_connection().await.unwrap_err();
    assert!(matches!(err, ClientError::HttpRequest(_)), "got {err:?}");
}
