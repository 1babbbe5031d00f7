pub mod search;

pub use search::KnowledgeSearch;
