pub mod chat;
pub mod verdict;
