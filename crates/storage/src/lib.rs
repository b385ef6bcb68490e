#![forbid(unsafe_code)]

pub mod question_bank;
pub mod repository;
pub mod sqlite;

pub use question_bank::{JsonQuestionBank, QuestionBankError};
pub use repository::{
    GameResultRow, InMemoryRepository, ProfileStore, QuestionSource, ResultReporter, Storage,
    StorageError,
};
