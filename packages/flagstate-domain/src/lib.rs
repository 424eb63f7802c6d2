pub mod context;
pub mod document_type;
pub mod expansion;
pub mod jurisdiction;
pub mod legal_code;
pub mod text;

pub use context::{QueryContext, QueryContextExtractor};
pub use document_type::DocumentType;
pub use expansion::{Aspect, AspectKind, Expansion, QueryExpander};
