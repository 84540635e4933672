pub mod check;
pub mod process;
pub mod settings;
pub mod suggest;
