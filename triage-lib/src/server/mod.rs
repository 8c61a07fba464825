//! HTTP surface: the admission pre-handler and a minimal demo server that
//! exercises it. Business routing lives outside this crate; the server
//! here serves one JSON endpoint behind the gate so the pre-handler
//! contract can be driven end to end.

mod admission;
mod run;

pub use admission::{apply_allow_headers, check_admission, extract_identity};
pub use run::run;
