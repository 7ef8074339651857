//! Drives one client-side test through its hooks and the redirector.

use crate::client::{TestTarget, WebTestClient};
use crate::error::{ClientError, Result};
use crate::hooks::{
    BEGIN_METHOD_PREFIX, END_METHOD_PREFIX, GLOBAL_BEGIN_METHOD, GLOBAL_END_METHOD, HookTable,
    hook_name,
};
use crate::request::WebRequest;
use crate::wrapped::WrappedFailure;
use cactus_common::WebTestResult;
use tracing::debug;

/// Runs tests of one client-side class: global and per-test begin hooks,
/// the server-side test, then per-test and global end hooks.
///
/// End hooks only run when the server-side test passed. A server-side
/// failure is returned as [`ClientError::Wrapped`].
#[derive(Debug)]
pub struct ClientTestCaller<F> {
    client: WebTestClient,
    hooks: HookTable<F>,
}

impl<F> ClientTestCaller<F> {
    pub fn new(client: WebTestClient, hooks: HookTable<F>) -> Self {
        Self { client, hooks }
    }

    pub fn client(&self) -> &WebTestClient {
        &self.client
    }

    pub async fn run_test(&self, fixture: &mut F, target: &TestTarget) -> Result<()> {
        let test_name = target.method_name.as_str();
        let mut request = WebRequest::new();

        self.hooks
            .call_begin(GLOBAL_BEGIN_METHOD, test_name, fixture, &mut request)?;
        if let Some(begin) = hook_name(BEGIN_METHOD_PREFIX, test_name) {
            self.hooks
                .call_begin(&begin, test_name, fixture, &mut request)?;
        }

        let (reply, result) = self.client.do_test(&mut request, target).await?;
        if let WebTestResult::Failed(details) = result {
            debug!(test_name, class_name = %details.class_name, "Server-side test failed");
            return Err(ClientError::Wrapped(WrappedFailure::new(details)));
        }

        if let Some(end) = hook_name(END_METHOD_PREFIX, test_name) {
            self.hooks
                .call_end(&end, test_name, fixture, &reply, &request)?;
        }
        self.hooks
            .call_end(GLOBAL_END_METHOD, test_name, fixture, &reply, &request)?;
        debug!(test_name, "Test passed");
        Ok(())
    }
}
