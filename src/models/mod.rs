pub mod file_record;
pub mod grouping;
pub mod header;
pub mod loaders;
pub mod subject;

pub use file_record::FileRecord;
pub use grouping::{ExamGroup, ExamUnit, GroupingProposal, SubjectGrouping};
pub use header::{Difficulty, FileHeader, HeaderMetadata, MaterialType};
pub use loaders::load_subject_vocabulary;
pub use subject::{SubjectVocabulary, SubjectYear};
