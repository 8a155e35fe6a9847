pub mod color;
pub mod cutscene;
pub mod pol;
pub mod script;
pub mod shape;
