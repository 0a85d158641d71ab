pub mod password;
pub mod types;

#[cfg(test)]
pub mod test_helpers;
