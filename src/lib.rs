#[cfg(test)]
mod test;

pub mod patch;

pub mod container;
pub mod index;
pub mod inject;

pub mod constants;
pub mod parameters;
pub mod swap;
