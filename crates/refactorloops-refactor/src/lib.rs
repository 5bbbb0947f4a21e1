mod extract;
mod prompts;
mod record;
mod requester;

pub use extract::{extract, ExtractStrategy, ExtractedRecord};
pub use prompts::{
    build_correction_prompt, create_policy, ConservativePolicy, PolicyKind, PromptPolicy,
    StrictPolicy,
};
pub use record::{normalize_code, RecordField, RefactorRecord, RefactorRequest};
pub use requester::{RefactorRequester, RequestError};
