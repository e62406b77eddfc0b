//! Remote suggestion generation: credentials, prompt, transport and reply
//! extraction.

pub mod gateway;
pub mod keys;
pub mod prompt;
pub mod reply;
pub mod transport;
