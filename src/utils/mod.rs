pub mod clock;
pub mod sanitize;
