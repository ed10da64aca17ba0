pub mod m202607200001_create_topics;
pub mod m202607200002_create_tasks;
pub mod m202607200003_create_submissions;
pub mod m202607200004_create_student_accounts;
