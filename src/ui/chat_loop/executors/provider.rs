use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::core::app::{AppAction, AppActionDispatcher};
use crate::core::provider_client::{ProviderClient, ProviderRequest};

pub fn spawn_provider_request(
    dispatcher: AppActionDispatcher,
    client: Arc<dyn ProviderClient>,
    turn_id: u64,
    request: ProviderRequest,
) {
    tokio::spawn(async move {
        let started = Instant::now();
        let endpoint = request.endpoint.id.clone();
        let result = client.complete(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => debug!(
                turn_id,
                %endpoint,
                elapsed_ms,
                tool_calls = response.tool_calls.len(),
                "Provider responded"
            ),
            Err(err) => debug!(turn_id, %endpoint, elapsed_ms, error = %err, "Provider returned an error"),
        }

        dispatcher.dispatch(AppAction::ProviderResponded { turn_id, result });
    });
}
