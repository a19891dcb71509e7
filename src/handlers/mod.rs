pub mod diet_handler;

pub use diet_handler::DietHandler;
