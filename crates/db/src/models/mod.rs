pub mod document;
pub mod flashcard;
pub mod generation;
pub mod pagination;
pub mod session;
pub mod topic;
pub mod user;
