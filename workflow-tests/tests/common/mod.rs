//! Common setup for workflow tests.

use workflow_tests::TestContext;

/// Spawn a fresh admin API stand-in and a gateway logged into it.
pub async fn setup() -> TestContext {
    TestContext::new().await
}
