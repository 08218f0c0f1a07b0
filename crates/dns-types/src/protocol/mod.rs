pub mod deserialise;
pub mod name;
pub mod punycode;
pub mod serialise;
pub mod types;
