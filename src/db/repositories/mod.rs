pub mod attendance;
pub mod courses;
pub mod seances;
pub mod students;
