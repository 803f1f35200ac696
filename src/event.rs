use crate::completion::CompletionError;
use crate::state::RequestId;

#[derive(Debug, Clone)]
pub enum AppEvent {
    CompletionResolved {
        id: RequestId,
        outcome: Result<String, CompletionError>,
    },
}
