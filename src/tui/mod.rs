pub mod canvas;
pub mod input;
pub mod mode;
pub mod view;
