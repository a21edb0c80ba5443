use tracing::trace;

use crate::repository::worker_client::WorkerResponse;
use crate::service::dispatcher::{CallPath, Dispatcher, InboundRequest};

use super::ControllerError;

/// Forward a call received on `path` to the function it names.
pub async fn call(
    path: &str,
    request: InboundRequest,
    dispatcher: &Dispatcher,
) -> Result<WorkerResponse, ControllerError> {
    let call = CallPath::parse(path)?;
    trace!("call {} on /{}", call.function, call.rest);
    Ok(dispatcher.dispatch(&call.function, &call.rest, request).await?)
}
