//! Primes each call with the recent conversation and records the new exchange.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Advisor, ChatRequest};
use crate::{error::Result, memory::MessageWindowMemory};

pub struct ChatMemoryAdvisor {
    memory: Arc<Mutex<MessageWindowMemory>>,
}

impl ChatMemoryAdvisor {
    pub fn new(memory: Arc<Mutex<MessageWindowMemory>>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Advisor for ChatMemoryAdvisor {
    fn name(&self) -> &'static str {
        "ChatMemoryAdvisor"
    }

    async fn before(&self, request: &mut ChatRequest) -> Result<()> {
        let memory = self.memory.lock().await;
        request.history = memory.messages();
        debug!("Primed request with {} remembered turn(s)", request.history.len());
        Ok(())
    }

    async fn after(&self, request: &ChatRequest, response: &str) -> Result<()> {
        let mut memory = self.memory.lock().await;
        memory.add_exchange(request.user_text.clone(), response);
        Ok(())
    }
}
