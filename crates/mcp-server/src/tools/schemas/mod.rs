pub mod code_search;
pub mod file_read;
pub mod investigation_report;
pub mod repo_list;
pub mod symbol_hint;
