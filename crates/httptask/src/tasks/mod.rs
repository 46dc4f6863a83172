//! Request shapes
//!
//! A shape is a preset descriptor plus hooks. Shapes hand both to a
//! [`FetchEngine`] rather than wrapping it, so every shape supports the full
//! set of descriptor settings (auth, destinations, timestamps).
//!
//! Built-in shapes:
//! - [`HttpGet`] - parameters appended to the URL
//! - [`HttpPost`] - parameters sent as a form body
//! - [`GitPulls`], [`GitUser`], [`GitComment`] - GitHub REST API requests

mod get;
mod github;

pub use get::{HttpGet, HttpPost};
pub use github::{
    json_field_list, GitComment, GitPulls, GitUser, DEFAULT_PULLS_PROPERTY, GITHUB_API_ROOT,
};

use crate::engine::{FetchEngine, FetchEngineBuilder, Hooks, Progress};
use crate::error::FetchError;
use crate::properties::Properties;
use crate::types::{FetchOutcome, RequestDescriptor};

/// A preconfigured request
pub trait Task: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Descriptor snapshot for one execution
    fn descriptor(&self) -> RequestDescriptor;

    /// Hooks the engine runs with
    fn hooks(&self) -> Hooks {
        Hooks::default()
    }
}

/// Run a task on an engine built from `builder`
///
/// The builder's hooks are replaced by the task's.
pub async fn run(
    task: &dyn Task,
    builder: FetchEngineBuilder,
    properties: &mut Properties,
) -> Result<FetchOutcome, FetchError> {
    run_with_progress(task, builder, properties, |_| {}).await
}

/// Run a task with progress updates
pub async fn run_with_progress<F>(
    task: &dyn Task,
    builder: FetchEngineBuilder,
    properties: &mut Properties,
    progress: F,
) -> Result<FetchOutcome, FetchError>
where
    F: FnMut(Progress),
{
    let engine: FetchEngine = builder.hooks(task.hooks()).build()?;
    let request = task.descriptor();
    tracing::debug!(
        task = task.name(),
        url = %request.url,
        params_in_url = engine.hooks().adds_params_to_url(),
        "Running task"
    );
    engine
        .execute_with_progress(&request, properties, progress)
        .await
}
