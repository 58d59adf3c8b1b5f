use async_trait::async_trait;
use tracing::debug;

use super::{Advisor, ChatRequest};
use crate::error::Result;

/// Logs the fully advised request and the completed response at debug level.
///
/// Register it last so it sees what the other advisors did to the request.
pub struct RequestLogAdvisor;

#[async_trait]
impl Advisor for RequestLogAdvisor {
    fn name(&self) -> &'static str {
        "RequestLogAdvisor"
    }

    async fn before(&self, request: &mut ChatRequest) -> Result<()> {
        debug!(
            history = request.history.len(),
            "Sending request: system={:?} user={:?}",
            request.system_prompt,
            request.user_message
        );
        Ok(())
    }

    async fn after(&self, _request: &ChatRequest, response: &str) -> Result<()> {
        debug!("Received response: {:?}", response);
        Ok(())
    }
}
