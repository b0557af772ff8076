//! Core logic for the escrow authority

mod authority;

pub use authority::AuthorityService;
