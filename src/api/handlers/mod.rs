pub mod health;
pub use self::health::health;

pub mod rpc;

#[cfg(test)]
mod tests;
