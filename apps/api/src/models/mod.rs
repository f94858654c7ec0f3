pub mod assignment;
pub mod syllabus;
