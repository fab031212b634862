//! One-time, best-effort preparation of data the summarizer needs.

use hf_hub::api::sync::Api;
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::summarizer::{model_repo, CONFIG_FILE, TOKENIZER_FILE};

static PREPARED: OnceCell<()> = OnceCell::new();

/// Makes sure the model's tokenization data is in the local cache.
///
/// Runs at most once per process. Failures are swallowed: loading the
/// model later reports a broken environment on its own.
pub fn prepare(config: &ModelConfig) {
    run_once(&PREPARED, || fetch_tokenizer_data(config));
}

/// Runs `step` the first time `cell` is seen and discards its error.
pub fn run_once<F>(cell: &OnceCell<()>, step: F)
where
    F: FnOnce() -> Result<()>,
{
    cell.get_or_init(|| {
        if let Err(err) = step() {
            debug!(error = %err, "resource preparation failed, continuing");
        }
    });
}

fn fetch_tokenizer_data(config: &ModelConfig) -> Result<()> {
    // `get` answers from the local cache when the file is already there
    let repo = Api::new()?.repo(model_repo(config));
    for file in [TOKENIZER_FILE, CONFIG_FILE] {
        let path = repo.get(file)?;
        debug!(path = %path.display(), "tokenization data ready");
    }
    Ok(())
}
