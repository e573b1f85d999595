pub mod client;
pub mod health;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod testing;
