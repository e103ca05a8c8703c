pub mod live;
pub mod synthetic;
