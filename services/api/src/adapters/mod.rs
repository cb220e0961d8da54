pub mod db;
pub mod mentor_llm;

pub use db::DbAdapter;
pub use mentor_llm::OpenAiMentorAdapter;
